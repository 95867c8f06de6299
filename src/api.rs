//! Public API Types
//!
//! 公開APIで使用するリクエスト・レスポンス型と列挙型を定義するモジュール。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::XlsxToCsvError;

/// シート参照
///
/// JSONでは数値（1始まりのインデックス）または文字列（シート名）として指定します。
/// 数値のみからなる文字列（例: `"2"`）はインデックスとして扱われます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    /// インデックス指定（1始まり）
    ///
    /// 例: `SheetRef::Index(1)` は最初のシートを選択
    Index(i64),

    /// シート名指定（大文字小文字を区別した完全一致）
    Name(String),
}

impl SheetRef {
    /// 数値文字列をインデックスに正規化する
    pub fn normalized(&self) -> SheetRef {
        match self {
            SheetRef::Name(name) => match name.trim().parse::<i64>() {
                Ok(index) => SheetRef::Index(index),
                Err(_) => self.clone(),
            },
            SheetRef::Index(_) => self.clone(),
        }
    }
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRef::Index(index) => write!(f, "index {}", index),
            SheetRef::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

impl From<usize> for SheetRef {
    fn from(index: usize) -> Self {
        SheetRef::Index(index as i64)
    }
}

impl From<&str> for SheetRef {
    fn from(name: &str) -> Self {
        SheetRef::Name(name.to_string())
    }
}

/// 引用符の付与方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum QuotePolicy {
    /// 必要な場合のみ引用符で囲む（デフォルト）
    ///
    /// 区切り文字、ダブルクォート、改行、CR、セミコロン、タブのいずれかを含む
    /// フィールドだけを引用符で囲みます。
    #[default]
    Necessary,

    /// すべてのフィールドを引用符で囲む
    Always,
}

/// 日付の出力形式
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateFormat {
    /// ISO 8601形式（デフォルト）
    ///
    /// 時刻が0時ちょうどの場合は`YYYY-MM-DD`、それ以外は`YYYY-MM-DD HH:MM:SS`。
    #[default]
    Iso8601,

    /// シリアル値をそのまま数値として出力
    ///
    /// 例: `2025-01-01` → `45658`
    Serial,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// 例: `DateFormat::Custom("%d/%m/%Y".to_string())`
    Custom(String),
}

/// レスポンス本文のエンコーディング
///
/// 変換処理自体は常にプレーンテキストのCSVを生成します。
/// この値はトランスポート層に引き渡されるだけです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEncoding {
    /// Base64でエンコードして返す（デフォルト）
    #[default]
    Base64,

    /// CSVテキストをそのまま返す
    Text,
}

/// リクエストごとの変換オプション
///
/// JSONリクエストボディのフィールド名（camelCase）に対応します。
/// 省略されたフィールドはデフォルト値になります。
///
/// # 使用例
///
/// ```rust
/// use xlsxcsv::{ConversionOptions, SheetRef};
///
/// let options = ConversionOptions::from_json(
///     r#"{"sheet": "Hoja1", "delimiter": ";", "fillMerges": true}"#,
/// ).unwrap();
/// assert_eq!(options.sheet, Some(SheetRef::Name("Hoja1".to_string())));
/// assert_eq!(options.delimiter, ";");
/// assert!(options.fill_merges);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionOptions {
    /// 変換対象のシート（省略時は最初のシート）
    pub sheet: Option<SheetRef>,

    /// フィールド区切り文字（複数文字も可、空の場合は`,`）
    pub delimiter: String,

    /// すべてのフィールドを引用符で囲むか（省略時はConverterの既定方針）
    pub force_quotes: Option<bool>,

    /// 結合セルの全セルに左上セルの値を複製するか
    pub fill_merges: bool,

    /// ヘッダー行の明示指定（使用範囲の先頭からの0始まりの行番号、省略時は自動検出）
    pub header_row: Option<usize>,

    /// 先頭セルがこの正規表現に一致する行を除外する（フッター・凡例行の除去用）
    pub skip_pattern: Option<String>,

    /// 明示的な列名（ヘッダー行の内容を位置ごとに置き換える）
    pub headers: Option<Vec<String>>,

    /// 空のヘッダーセルを`col_N`（1始まり）で補完するか
    pub name_blank_headers: bool,

    /// セル値の前後の空白を除去するか
    pub trim_cells: bool,

    /// レスポンス本文のエンコーディング（トランスポート層向け）
    pub response: ResponseEncoding,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            delimiter: ",".to_string(),
            force_quotes: None,
            fill_merges: false,
            header_row: None,
            skip_pattern: None,
            headers: None,
            name_blank_headers: false,
            trim_cells: false,
            response: ResponseEncoding::Base64,
        }
    }
}

impl ConversionOptions {
    /// JSON文字列からオプションを読み込む
    pub fn from_json(json: &str) -> Result<Self, XlsxToCsvError> {
        serde_json::from_str(json)
            .map_err(|e| XlsxToCsvError::Config(format!("Invalid conversion options: {}", e)))
    }

    /// シートを指定する
    pub fn with_sheet(mut self, sheet: impl Into<SheetRef>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// 区切り文字を指定する
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }
}

/// 変換結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutput {
    /// MIMEタイプ（常に`text/csv`）
    pub mime_type: String,

    /// CSV本文（プレーンテキスト）
    pub body: String,

    /// トランスポート層が適用すべきエンコーディング
    pub encoding: ResponseEncoding,
}

/// デバッグ用のシート概要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    /// シート名
    pub name: String,

    /// 使用範囲（A1形式、空のシートはNone）
    pub used_range_ref: Option<String>,

    /// 先頭数行の描画済みプレビュー
    pub preview: Vec<Vec<String>>,
}
