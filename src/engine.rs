//! External Engine Module
//!
//! 外部の文書変換エンジン（LibreOfficeの`soffice`など）を使ってCSVを生成する
//! フォールバック戦略を提供するモジュール。
//! パイプラインは`ExternalEngine`トレイトにのみ依存し、サブプロセスの詳細は
//! `SofficeEngine`に閉じ込められます。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use rust_xlsxwriter::{Format, Workbook as XlsxWriter, Worksheet};

use crate::error::EngineError;
use crate::types::{CellValue, Sheet};

/// 外部エンジンのポーリング間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 1900年エポックと1904年エポックのシリアル値の差
const DAYS_1900_TO_1904: f64 = 1462.0;

/// 外部変換エンジン
///
/// 1シートだけを含むワークブックを受け取り、数式を評価した上でCSVを返します。
pub trait ExternalEngine: Send + Sync {
    /// ログ出力用のエンジン名
    fn name(&self) -> &str;

    /// エンジンが利用可能かを確認する（生存確認）
    fn is_available(&self) -> bool;

    /// ワークブックをCSVに変換する
    ///
    /// # 引数
    ///
    /// * `workbook` - 1シートのXLSXファイルの内容
    /// * `delimiter` - フィールド区切り文字
    /// * `timeout` - 変換処理のタイムアウト
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(String))` - 変換結果
    /// * `Ok(None)` - エンジンが結果を生成しなかった場合
    /// * `Err(EngineError)` - 起動失敗、異常終了、タイムアウトの場合
    fn render_csv(
        &self,
        workbook: &[u8],
        delimiter: &str,
        timeout: Duration,
    ) -> Result<Option<String>, EngineError>;
}

/// LibreOffice（`soffice`）をヘッドレスで起動する外部エンジン
#[derive(Debug, Clone)]
pub struct SofficeEngine {
    /// 実行ファイルのパス
    program: PathBuf,

    /// 生存確認のタイムアウト
    probe_timeout: Duration,
}

impl Default for SofficeEngine {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl SofficeEngine {
    /// 新しいSofficeEngineインスタンスを生成
    ///
    /// # 引数
    ///
    /// * `program` - `soffice`実行ファイルのパス（PATHから検索する場合はコマンド名）
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            probe_timeout: Duration::from_secs(10),
        }
    }

    /// 生存確認のタイムアウトを設定
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// 変換用のコマンドを構築
    fn convert_command(&self, workdir: &Path, input: &Path, delimiter: &str) -> Command {
        let profile = workdir.join("profile");
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg("--nofirststartwizard")
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--convert-to")
            .arg(csv_filter(delimiter))
            .arg("--outdir")
            .arg(workdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child, EngineError> {
        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::Unavailable(format!("{} not found", self.program.display()))
            } else {
                EngineError::Io(e)
            }
        })
    }
}

impl ExternalEngine for SofficeEngine {
    fn name(&self) -> &str {
        "soffice"
    }

    fn is_available(&self) -> bool {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match self.spawn(&mut cmd) {
            Ok(child) => matches!(wait_with_timeout(child, self.probe_timeout), Ok(true)),
            Err(_) => false,
        }
    }

    fn render_csv(
        &self,
        workbook: &[u8],
        delimiter: &str,
        timeout: Duration,
    ) -> Result<Option<String>, EngineError> {
        // 一時ディレクトリはすべての終了経路で削除される
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.xlsx");
        fs::write(&input, workbook)?;

        let mut cmd = self.convert_command(workdir.path(), &input, delimiter);
        tracing::info!(engine = self.name(), "Invoking external engine: {:?}", cmd);
        let child = self.spawn(&mut cmd)?;

        if !wait_with_timeout(child, timeout)? {
            return Err(EngineError::Failed(format!(
                "{} exited with a non-zero status",
                self.program.display()
            )));
        }

        let output = workdir.path().join("input.csv");
        if !output.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&output)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// 子プロセスの終了を待つ（タイムアウト時はプロセスを強制終了する）
///
/// # 戻り値
///
/// * `Ok(true)` - 正常終了
/// * `Ok(false)` - 非ゼロの終了ステータス
/// * `Err(EngineError::Timeout)` - タイムアウト
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<bool, EngineError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.success());
        }
        if started.elapsed() >= timeout {
            // kill失敗時も終了済みの可能性があるため無視する
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Timeout(timeout.as_millis()));
        }
        sleep(POLL_INTERVAL);
    }
}

/// LibreOfficeのCSVフィルター指定を生成
///
/// 形式: `csv:Text - txt - csv (StarCalc):区切り文字,引用符,文字コード,開始行`
/// 単一文字の区切り文字は文字コードで、それ以外はカンマ（44）で指定します。
fn csv_filter(delimiter: &str) -> String {
    let mut chars = delimiter.chars();
    let separator = match (chars.next(), chars.next()) {
        (Some(c), None) => c as u32,
        _ => ',' as u32,
    };
    // 34 = ダブルクォート、76 = UTF-8、1 = 先頭行から
    format!("csv:Text - txt - csv (StarCalc):{},34,76,1", separator)
}

/// シートを1シートだけのXLSXファイルとして書き出す
///
/// セル値と数式を保持し、書式は日付の表示形式のみを設定します。
pub(crate) fn materialize_sheet(sheet: &Sheet) -> Result<Vec<u8>, EngineError> {
    let mut workbook = XlsxWriter::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    // 書き出すワークブックは常に1900年エポック
    let date_offset = if sheet.is_1904() { DAYS_1900_TO_1904 } else { 0.0 };

    let worksheet = workbook.add_worksheet();
    if let Err(e) = worksheet.set_name(sheet.name()) {
        tracing::debug!(sheet = sheet.name(), "Keeping default sheet name: {}", e);
    }

    for (coord, value) in sheet.cells() {
        let Ok(col) = u16::try_from(coord.col) else {
            continue;
        };
        write_value(worksheet, coord.row, col, value, &date_format, date_offset)?;
    }

    for (coord, formula) in sheet.formulas() {
        let Ok(col) = u16::try_from(coord.col) else {
            continue;
        };
        worksheet
            .write_formula(coord.row, col, formula.as_str())
            .map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    date_format: &Format,
    date_offset: f64,
) -> Result<(), EngineError> {
    let result = match value {
        CellValue::Number(n) if n.is_finite() => worksheet.write_number(row, col, *n),
        CellValue::Date(serial) if serial.is_finite() => {
            worksheet.write_number_with_format(row, col, *serial + date_offset, date_format)
        }
        CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
        CellValue::Text(s) | CellValue::Error(s) => worksheet.write_string(row, col, s),
        _ => return Ok(()),
    };
    result.map(|_| ()).map_err(xlsx_error)
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> EngineError {
    EngineError::Failed(format!("Failed to materialize sheet: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    #[test]
    fn test_csv_filter_delimiter_codes() {
        assert_eq!(csv_filter(","), "csv:Text - txt - csv (StarCalc):44,34,76,1");
        assert_eq!(csv_filter(";"), "csv:Text - txt - csv (StarCalc):59,34,76,1");
        assert_eq!(csv_filter("\t"), "csv:Text - txt - csv (StarCalc):9,34,76,1");
        assert_eq!(csv_filter("||"), "csv:Text - txt - csv (StarCalc):44,34,76,1");
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let engine = SofficeEngine::new("/nonexistent/soffice-binary");
        assert!(!engine.is_available());

        let result = engine.render_csv(b"PK", ",", Duration::from_secs(1));
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
    }

    #[test]
    fn test_materialize_sheet_round_trip() {
        let mut sheet = Sheet::new("Data");
        sheet.set_cell(0, 0, CellValue::Text("id".to_string()));
        sheet.set_cell(0, 1, CellValue::Text("total".to_string()));
        sheet.set_cell(1, 0, CellValue::Number(1.0));
        sheet.set_cell(1, 2, CellValue::Bool(true));
        sheet.set_formula(1, 1, "=A2*10");
        sheet.fit_used_range();

        let bytes = materialize_sheet(&sheet).unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Data".to_string()]);

        let range = workbook.worksheet_range("Data").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("id".to_string())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(1.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Bool(true)));

        let formulas = workbook.worksheet_formula("Data").unwrap();
        assert_eq!(formulas.get_value((1, 1)).map(|f| f.as_str()), Some("A2*10"));
    }

    #[test]
    fn test_materialize_sheet_invalid_name_keeps_default() {
        let mut sheet = Sheet::new("a/b");
        sheet.set_cell(0, 0, CellValue::Text("x".to_string()));
        let bytes = materialize_sheet(&sheet).unwrap();
        let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Sheet1".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_kills_slow_process() {
        let child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let started = Instant::now();
        let result = wait_with_timeout(child, Duration::from_millis(100));
        assert!(matches!(result, Err(EngineError::Timeout(100))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
