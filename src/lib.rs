//! Photoroom画像編集APIによる商品写真の一括加工と、Shopifyへの画像登録

pub mod batch;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod http;
pub mod interactive;
pub mod logging;
pub mod output;
pub mod photoroom;
pub mod report;
pub mod resize;
pub mod retry;
pub mod scanner;
pub mod shopify;

pub use batch::{BatchOptions, BatchReport, Pipeline};
pub use error::{BatchError, Result};
