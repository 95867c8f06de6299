//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// エラーの分類
///
/// HTTPなどのトランスポート層が、呼び出し側の入力ミス（4xx相当）と
/// 内部障害（5xx相当）を区別するために使用します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 呼び出し側の入力に起因するエラー（不正なシート指定、設定値、サイズ超過など）
    InvalidInput,

    /// 内部処理の失敗（ワークブックのデコード失敗、I/Oエラーなど）
    Internal,
}

/// xlsxcsvクレート全体で使用するエラー型
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Decode`: ワークブックのデコードに失敗したエラー（calamine由来）
/// - `SheetNotFound`: 指定されたシートが存在しない
/// - `Config`: 設定・リクエストの検証に失敗したエラー
/// - `InvalidPattern`: 行スキップ用の正規表現が不正
/// - `SecurityViolation`: 入力サイズやZIP構造の制限違反
///
/// 空のシートはエラーではなく、空のCSVとして扱われます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxcsv::{ConversionOptions, ConverterBuilder, ErrorClass, XlsxToCsvError};
///
/// let converter = ConverterBuilder::new().build().unwrap();
/// let bytes: Vec<u8> = vec![];
/// match converter.convert(bytes.as_slice(), &ConversionOptions::default()) {
///     Ok(output) => println!("{}", output.body),
///     Err(e) if e.class() == ErrorClass::InvalidInput => eprintln!("bad request: {}", e),
///     Err(e) => eprintln!("conversion failed: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxToCsvError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックのデコード中に発生したエラー
    ///
    /// calamineクレートがワークブックを解析する際に発生したエラーです。
    /// ファイル形式が不正、破損したファイルなどが原因となります。
    #[error("Failed to decode workbook: {0}")]
    Decode(#[from] calamine::Error),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 指定されたシートが見つからないエラー
    ///
    /// エラーメッセージには、ワークブック内の有効なシート名の一覧が含まれます。
    #[error("Sheet {reference} not found. Available: {}", .available.join(", "))]
    SheetNotFound {
        /// 呼び出し側が指定したシート参照（インデックスまたは名前）
        reference: String,
        /// ワークブック内のシート名（順序どおり）
        available: Vec<String>,
    },

    /// 設定・リクエストの検証に失敗したエラー
    ///
    /// `ConverterBuilder::build()`時の設定検証や、リクエストごとのオプション検証
    /// （空でない区切り文字、ヘッダー行の範囲など）で発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 行スキップパターンの正規表現が不正
    #[error("Invalid skip pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// セキュリティ制限に違反したエラー
    ///
    /// ペイロードサイズ上限、ZIP bomb、パストラバーサルなどの制限に
    /// 違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl XlsxToCsvError {
    /// エラーを入力起因か内部障害かに分類する
    pub fn class(&self) -> ErrorClass {
        match self {
            XlsxToCsvError::SheetNotFound { .. }
            | XlsxToCsvError::Config(_)
            | XlsxToCsvError::InvalidPattern(_)
            | XlsxToCsvError::SecurityViolation(_) => ErrorClass::InvalidInput,
            XlsxToCsvError::Io(_)
            | XlsxToCsvError::Decode(_)
            | XlsxToCsvError::Utf8(_)
            | XlsxToCsvError::Zip(_) => ErrorClass::Internal,
        }
    }
}

/// 外部変換エンジンのエラー
///
/// パイプライン内ではログに記録されるだけで、変換リクエスト全体を
/// 失敗させることはありません。
#[derive(Error, Debug)]
pub enum EngineError {
    /// エンジンが利用できない（実行ファイルが見つからない、疎通確認に失敗）
    #[error("External engine unavailable: {0}")]
    Unavailable(String),

    /// エンジンの実行に失敗した
    #[error("External engine failed: {0}")]
    Failed(String),

    /// 制限時間内にエンジンが終了しなかった
    #[error("External engine timed out after {0} ms")]
    Timeout(u128),

    /// 一時ファイルの入出力エラー
    #[error("External engine IO error: {0}")]
    Io(#[from] std::io::Error),
}
