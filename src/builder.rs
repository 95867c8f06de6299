//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use rayon::prelude::*;

use crate::api::{ConversionOptions, ConversionOutput, DateFormat, QuotePolicy, SheetSummary};
use crate::detect::HeaderDetector;
use crate::engine::ExternalEngine;
use crate::error::XlsxToCsvError;
use crate::formatter::CellRenderer;
use crate::grid::{render_rows, TableExtractor};
use crate::parser::WorkbookParser;
use crate::pipeline::{ConversionPipeline, ExtractionRequest};
use crate::security::SecurityConfig;
use crate::selector::resolve_sheet_index;
use crate::types::{Sheet, Workbook};

/// `list_sheets`のプレビュー行数
const PREVIEW_ROWS: usize = 5;

/// 変換処理の設定を保持する内部構造体
#[derive(Clone)]
pub(crate) struct ConversionConfig {
    /// 入力サイズ・ZIPの制限
    pub security: SecurityConfig,

    /// ヘッダー検出で走査する先頭行数
    pub header_scan_window: usize,

    /// ヘッダー行を示すマーカートークン
    pub header_markers: Vec<String>,

    /// ヘッダー行が空の場合に列範囲を求めるための先読み行数
    pub bounds_lookahead: usize,

    /// 日付形式
    pub date_format: DateFormat,

    /// 数値に桁区切りを付けるか
    pub thousands_separator: bool,

    /// `forceQuotes`が省略された場合の引用符の付与方針
    pub quote_policy: QuotePolicy,

    /// 外部変換エンジン（Noneの場合は使用しない）
    pub engine: Option<Arc<dyn ExternalEngine>>,

    /// 外部変換エンジンのタイムアウト
    pub engine_timeout: Duration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            security: SecurityConfig::default(),
            header_scan_window: 50,
            header_markers: vec!["date".to_string()],
            bounds_lookahead: 50,
            date_format: DateFormat::Iso8601,
            thousands_separator: false,
            quote_policy: QuotePolicy::Necessary,
            engine: None,
            engine_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("security", &self.security)
            .field("header_scan_window", &self.header_scan_window)
            .field("header_markers", &self.header_markers)
            .field("bounds_lookahead", &self.bounds_lookahead)
            .field("date_format", &self.date_format)
            .field("thousands_separator", &self.thousands_separator)
            .field("quote_policy", &self.quote_policy)
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .field("engine_timeout", &self.engine_timeout)
            .finish()
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use xlsxcsv::{ConverterBuilder, DateFormat, SofficeEngine};
///
/// # fn main() -> Result<(), xlsxcsv::XlsxToCsvError> {
/// let converter = ConverterBuilder::new()
///     .with_header_markers(vec!["date".to_string(), "fecha".to_string()])
///     .with_date_format(DateFormat::Iso8601)
///     .with_external_engine(Arc::new(SofficeEngine::default()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 入力サイズ上限: 20MiB
    /// - ヘッダー検出: 先頭50行、マーカー`date`
    /// - 日付形式: ISO 8601
    /// - 桁区切り: なし
    /// - 外部エンジン: 使用しない
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力ペイロードの最大サイズ（バイト）を指定する
    pub fn with_max_input_size(mut self, bytes: u64) -> Self {
        self.config.security.max_input_size = bytes;
        self
    }

    /// ヘッダー検出で走査する先頭行数を指定する（1以上）
    pub fn with_header_scan_window(mut self, rows: usize) -> Self {
        self.config.header_scan_window = rows;
        self
    }

    /// ヘッダー行を示すマーカートークンを指定する
    ///
    /// いずれかのセルがマーカーと一致する行は、ヘッダー候補として優先されます
    /// （前後の空白と大文字小文字は無視）。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxcsv::ConverterBuilder;
    ///
    /// let converter = ConverterBuilder::new()
    ///     .with_header_markers(vec!["date".to_string(), "fecha".to_string()])
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn with_header_markers(mut self, markers: Vec<String>) -> Self {
        self.config.header_markers = markers;
        self
    }

    /// ヘッダー行が空の場合に列範囲を求めるための先読み行数を指定する
    pub fn with_bounds_lookahead(mut self, rows: usize) -> Self {
        self.config.bounds_lookahead = rows;
        self
    }

    /// 日付の出力形式を指定する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxcsv::{ConverterBuilder, DateFormat};
    ///
    /// // シリアル値をそのまま出力
    /// let builder = ConverterBuilder::new().with_date_format(DateFormat::Serial);
    ///
    /// // カスタム形式
    /// let builder = ConverterBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()));
    /// ```
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 数値の整数部に3桁ごとのカンマを挿入するかを指定する
    pub fn with_thousands_separator(mut self, enabled: bool) -> Self {
        self.config.thousands_separator = enabled;
        self
    }

    /// `forceQuotes`が省略されたリクエストの引用符の付与方針を指定する
    pub fn with_quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.config.quote_policy = policy;
        self
    }

    /// 外部変換エンジンを設定する
    ///
    /// 構造化抽出と生グリッドの両方が空の場合にのみ使用されます。
    pub fn with_external_engine(mut self, engine: Arc<dyn ExternalEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    /// 外部変換エンジンのタイムアウトを指定する
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.config.engine_timeout = timeout;
        self
    }

    /// 設定を検証し、`Converter`を構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Converter)` - 構築に成功した場合
    /// * `Err(XlsxToCsvError::Config)` - 設定値が不正な場合
    pub fn build(self) -> Result<Converter, XlsxToCsvError> {
        // 1. 数値設定の検証
        if self.config.header_scan_window == 0 {
            return Err(XlsxToCsvError::Config(
                "Header scan window must be at least 1 row".to_string(),
            ));
        }
        if self.config.security.max_input_size == 0 {
            return Err(XlsxToCsvError::Config(
                "Maximum input size must be greater than 0".to_string(),
            ));
        }
        if self.config.engine_timeout.is_zero() {
            return Err(XlsxToCsvError::Config(
                "Engine timeout must be greater than 0".to_string(),
            ));
        }

        // 2. カスタム日付形式の検証
        if let DateFormat::Custom(ref format_str) = self.config.date_format {
            validate_date_format(format_str)?;
        }

        // 3. Converterインスタンス生成
        Ok(Converter::new(self.config))
    }
}

/// chrono形式の日付フォーマット文字列を検証
fn validate_date_format(format_str: &str) -> Result<(), XlsxToCsvError> {
    let invalid = format_str.is_empty()
        || StrftimeItems::new(format_str).any(|item| matches!(item, Item::Error));
    if invalid {
        return Err(XlsxToCsvError::Config(format!(
            "Invalid date format string: '{}'",
            format_str
        )));
    }
    Ok(())
}

/// 変換処理のファサード
///
/// XLSXファイルの1シートをCSVに変換するためのメインエントリーポイントです。
/// `Converter`は不変で、複数スレッドから同時に使用できます。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::fs::File;
/// use xlsxcsv::{ConversionOptions, ConverterBuilder};
///
/// # fn main() -> Result<(), xlsxcsv::XlsxToCsvError> {
/// let converter = ConverterBuilder::new().build()?;
/// let input = File::open("report.xlsx")?;
/// let options = ConversionOptions::default().with_sheet(2usize).with_delimiter(";");
/// let output = converter.convert(input, &options)?;
/// assert_eq!(output.mime_type, "text/csv");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,

    /// セルレンダラー
    renderer: CellRenderer,

    /// ヘッダー行検出器
    detector: HeaderDetector,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig) -> Self {
        Self {
            renderer: CellRenderer::new(config.date_format.clone(), config.thousands_separator),
            detector: HeaderDetector::new(&config.header_markers, config.header_scan_window),
            config,
        }
    }

    /// XLSXファイルの1シートをCSVに変換
    ///
    /// # 引数
    ///
    /// * `input` - XLSXファイルを読み込むためのリーダー
    /// * `options` - リクエストごとの変換オプション
    ///
    /// # 戻り値
    ///
    /// * `Ok(ConversionOutput)` - 変換結果（MIMEタイプ`text/csv`）
    /// * `Err(XlsxToCsvError)` - エラーが発生した場合
    ///
    /// # 処理フロー
    ///
    /// 1. 入力の読み込み（サイズ制限を適用）
    /// 2. オプションの検証
    /// 3. アーカイブの検査とワークブックのデコード
    /// 4. シート選択
    /// 5. 変換パイプラインの実行
    pub fn convert<R: Read>(
        &self,
        input: R,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, XlsxToCsvError> {
        let bytes = self.config.security.read_input(input)?;
        let request = ExtractionRequest::from_options(options, self.config.quote_policy)?;

        let mut parser = WorkbookParser::open(&bytes, &self.config.security)?;
        let names = parser.sheet_names();
        let index = resolve_sheet_index(&names, options.sheet.as_ref())?;
        tracing::debug!(sheet = %names[index], index, "Selected sheet");

        let sheet = parser.load_sheet(&names[index])?;
        self.convert_sheet(&sheet, &request, options)
    }

    /// XLSXファイルの1シートをCSV文字列に変換
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::fs::File;
    /// use xlsxcsv::{ConversionOptions, ConverterBuilder};
    ///
    /// # fn main() -> Result<(), xlsxcsv::XlsxToCsvError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let csv = converter.convert_to_string(File::open("report.xlsx")?, &ConversionOptions::default())?;
    /// println!("{}", csv);
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert_to_string<R: Read>(
        &self,
        input: R,
        options: &ConversionOptions,
    ) -> Result<String, XlsxToCsvError> {
        self.convert(input, options).map(|output| output.body)
    }

    /// デコード済みのワークブックの1シートをCSVに変換
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxcsv::{CellValue, ConversionOptions, ConverterBuilder, Sheet, Workbook};
    ///
    /// let workbook = Workbook::new(vec![Sheet::from_rows(
    ///     "Data",
    ///     vec![
    ///         vec![CellValue::Text("id".into()), CellValue::Text("ok".into())],
    ///         vec![CellValue::Number(1.0), CellValue::Bool(true)],
    ///     ],
    /// )]);
    /// let converter = ConverterBuilder::new().build().unwrap();
    /// let output = converter
    ///     .convert_workbook(&workbook, &ConversionOptions::default())
    ///     .unwrap();
    /// assert_eq!(output.body, "id,ok\n1,TRUE");
    /// ```
    pub fn convert_workbook(
        &self,
        workbook: &Workbook,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, XlsxToCsvError> {
        let request = ExtractionRequest::from_options(options, self.config.quote_policy)?;
        let sheet = workbook.sheet(options.sheet.as_ref())?;
        self.convert_sheet(sheet, &request, options)
    }

    /// ワークブック内の全シートの概要を取得（デバッグ用）
    ///
    /// 各シートは並列にデコードされ、結果はワークブック内の順序で返されます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<SheetSummary>)` - シート名、使用範囲、先頭5行のプレビュー
    /// * `Err(XlsxToCsvError)` - エラーが発生した場合
    pub fn list_sheets<R: Read>(&self, input: R) -> Result<Vec<SheetSummary>, XlsxToCsvError> {
        let bytes = self.config.security.read_input(input)?;

        // アーカイブの検査は1回だけ行い、メタデータを各シートの処理で再利用
        let parser = WorkbookParser::open(&bytes, &self.config.security)?;
        let names = parser.sheet_names();
        let metadata = parser.metadata().clone();

        names
            .par_iter()
            .map(|name| {
                let mut parser =
                    WorkbookParser::open_with_existing_metadata(&bytes, metadata.clone())?;
                let sheet = parser.load_sheet(name)?;
                Ok(self.summarize(&sheet))
            })
            .collect()
    }

    fn convert_sheet(
        &self,
        sheet: &Sheet,
        request: &ExtractionRequest,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, XlsxToCsvError> {
        let extractor =
            TableExtractor::new(&self.renderer, &self.detector, self.config.bounds_lookahead);
        let pipeline = ConversionPipeline::new(
            extractor,
            self.config.engine.as_deref(),
            self.config.engine_timeout,
        );
        let outcome = pipeline.run(sheet, request)?;
        tracing::debug!(
            sheet = sheet.name(),
            strategy = ?outcome.strategy,
            bytes = outcome.body.len(),
            "Conversion finished"
        );

        Ok(ConversionOutput {
            mime_type: "text/csv".to_string(),
            body: outcome.body,
            encoding: options.response,
        })
    }

    fn summarize(&self, sheet: &Sheet) -> SheetSummary {
        let used_range = sheet.used_range();
        SheetSummary {
            name: sheet.name().to_string(),
            used_range_ref: used_range.map(|range| range.to_a1_ref()),
            preview: used_range
                .map(|range| {
                    render_rows(sheet, range, &self.renderer, None, false, Some(PREVIEW_ROWS))
                })
                .unwrap_or_default(),
        }
    }
}
