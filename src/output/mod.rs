//! Output Module
//!
//! 矩形のテーブル（Grid）を区切り文字テキストとして出力するモジュール。

mod delimited;

pub(crate) use delimited::{validate_delimiter, DelimitedWriter};
