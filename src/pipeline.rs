//! Conversion Pipeline Module
//!
//! 構造化抽出 → 生グリッド → 外部エンジンの順に戦略を試し、
//! 最初に空でない結果を返すフォールバックチェーンを実装するモジュール。

use std::time::Duration;

use regex::Regex;

use crate::api::{ConversionOptions, QuotePolicy};
use crate::engine::{materialize_sheet, ExternalEngine};
use crate::error::{EngineError, XlsxToCsvError};
use crate::grid::{raw_grid, TableExtractor, TableOptions};
use crate::output::{validate_delimiter, DelimitedWriter};
use crate::types::Sheet;

/// 変換戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    /// ヘッダー検出と列範囲による構造化抽出
    Structured,

    /// 実際のセル配置から生成した型解釈なしのグリッド
    RawGrid,

    /// 外部エンジンによる変換（数式を評価）
    ExternalEngine,
}

/// 検証済みのリクエスト
#[derive(Debug, Clone)]
pub(crate) struct ExtractionRequest {
    /// テーブル抽出の設定
    pub table: TableOptions,

    /// 区切り文字
    pub delimiter: String,

    /// 引用符の付与方針
    pub policy: QuotePolicy,
}

impl ExtractionRequest {
    /// 変換オプションを検証し、リクエストを生成
    ///
    /// # 引数
    ///
    /// * `options` - リクエストごとの変換オプション
    /// * `default_policy` - `forceQuotes`が省略された場合の引用符の付与方針
    ///
    /// # 戻り値
    ///
    /// * `Ok(ExtractionRequest)` - 検証に成功した場合
    /// * `Err(XlsxToCsvError)` - 区切り文字または正規表現が不正な場合
    pub fn from_options(
        options: &ConversionOptions,
        default_policy: QuotePolicy,
    ) -> Result<Self, XlsxToCsvError> {
        let delimiter = validate_delimiter(&options.delimiter)?;
        let policy = match options.force_quotes {
            Some(true) => QuotePolicy::Always,
            Some(false) => QuotePolicy::Necessary,
            None => default_policy,
        };
        let skip_pattern = options
            .skip_pattern
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            table: TableOptions {
                fill_merges: options.fill_merges,
                header_row: options.header_row,
                skip_pattern,
                headers: options.headers.clone(),
                name_blank_headers: options.name_blank_headers,
                trim_cells: options.trim_cells,
            },
            delimiter,
            policy,
        })
    }
}

/// パイプラインの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipelineOutcome {
    /// CSV本文
    pub body: String,

    /// 結果を生成した戦略（すべて空の場合はNone）
    pub strategy: Option<Strategy>,
}

/// 変換パイプライン
pub(crate) struct ConversionPipeline<'a> {
    extractor: TableExtractor<'a>,
    engine: Option<&'a dyn ExternalEngine>,
    engine_timeout: Duration,
}

impl<'a> ConversionPipeline<'a> {
    /// 新しいConversionPipelineインスタンスを生成
    pub fn new(
        extractor: TableExtractor<'a>,
        engine: Option<&'a dyn ExternalEngine>,
        engine_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            engine,
            engine_timeout,
        }
    }

    /// シートをCSVに変換
    ///
    /// 各戦略を順に試し、最初に空白以外の内容を含む結果を返します。
    /// 外部エンジンの失敗はログに記録され、変換自体は失敗しません。
    ///
    /// # 戻り値
    ///
    /// * `Ok(PipelineOutcome)` - 変換結果（すべての戦略が空の場合は空文字列）
    /// * `Err(XlsxToCsvError)` - 構造化抽出の設定エラーなど
    pub fn run(
        &self,
        sheet: &Sheet,
        request: &ExtractionRequest,
    ) -> Result<PipelineOutcome, XlsxToCsvError> {
        let writer = DelimitedWriter::new(request.delimiter.as_str(), request.policy);

        // 1. 構造化抽出
        let grid = self.extractor.extract(sheet, &request.table)?;
        if grid.is_empty() {
            tracing::debug!(sheet = sheet.name(), "Structured extraction found no table");
        }
        let body = writer.render_to_string(&grid)?;
        if has_content(&body) {
            tracing::debug!(
                sheet = sheet.name(),
                rows = grid.rows().len(),
                columns = grid.width(),
                "Structured extraction succeeded"
            );
            return Ok(PipelineOutcome {
                body,
                strategy: Some(Strategy::Structured),
            });
        }

        // 2. 生グリッド
        let grid = raw_grid(sheet);
        let body = writer.render_to_string(&grid)?;
        if has_content(&body) {
            tracing::warn!(
                sheet = sheet.name(),
                "Structured extraction was empty; falling back to raw grid"
            );
            return Ok(PipelineOutcome {
                body,
                strategy: Some(Strategy::RawGrid),
            });
        }

        // 3. 外部エンジン
        if let Some(body) = self.run_engine(sheet, request) {
            return Ok(PipelineOutcome {
                body,
                strategy: Some(Strategy::ExternalEngine),
            });
        }

        tracing::debug!(sheet = sheet.name(), "Sheet has no content");
        Ok(PipelineOutcome {
            body: String::new(),
            strategy: None,
        })
    }

    /// 外部エンジンを実行（失敗時はログに記録してNoneを返す）
    fn run_engine(&self, sheet: &Sheet, request: &ExtractionRequest) -> Option<String> {
        let engine = self.engine?;
        if sheet.cell_count() == 0 {
            return None;
        }
        if !engine.is_available() {
            tracing::warn!(engine = engine.name(), "External engine is not available");
            return None;
        }

        let result = materialize_sheet(sheet).and_then(|workbook| {
            engine.render_csv(&workbook, &request.delimiter, self.engine_timeout)
        });

        match result {
            Ok(Some(text)) => {
                let body = text.trim_end_matches(['\r', '\n']).to_string();
                if has_content(&body) {
                    Some(body)
                } else {
                    None
                }
            }
            Ok(None) => {
                tracing::warn!(engine = engine.name(), "External engine produced no output");
                None
            }
            Err(EngineError::Timeout(ms)) => {
                tracing::warn!(
                    engine = engine.name(),
                    "External engine timed out after {} ms",
                    ms
                );
                None
            }
            Err(e) => {
                tracing::warn!(engine = engine.name(), "External engine failed: {}", e);
                None
            }
        }
    }
}

fn has_content(body: &str) -> bool {
    !body.trim().is_empty()
}
