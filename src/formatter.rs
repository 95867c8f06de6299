//! Formatter Module
//!
//! セル値を正規化された文字列表現に変換するモジュール。
//! ロケール依存の書式（桁区切り、地域固有の日付表記）は適用しません。

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::api::DateFormat;
use crate::types::CellValue;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// セルレンダラー
///
/// セル値の描画処理のファサードとして機能します。
#[derive(Debug, Clone)]
pub(crate) struct CellRenderer {
    /// 日付フォーマッター
    date_formatter: DateFormatter,

    /// 数値フォーマッター
    number_formatter: NumberFormatter,
}

impl CellRenderer {
    /// 新しいCellRendererインスタンスを生成
    pub fn new(date_format: DateFormat, thousands_separator: bool) -> Self {
        Self {
            date_formatter: DateFormatter { date_format },
            number_formatter: NumberFormatter {
                thousands_separator,
            },
        }
    }

    /// セル値を描画
    ///
    /// # 引数
    ///
    /// * `value` - デコード済みのセル値
    /// * `is_1904` - 1904年エポックを使用するかどうか
    ///
    /// # 戻り値
    ///
    /// 正規化された文字列（CSVエスケープは行わない）
    pub fn render(&self, value: &CellValue, is_1904: bool) -> String {
        match value {
            CellValue::Number(n) => self.number_formatter.format(*n),
            CellValue::Date(serial) => match self.date_formatter.date_format {
                // シリアル値には桁区切りを適用しない
                DateFormat::Serial => plain_number(*serial),
                _ => self.date_formatter.format(*serial, is_1904),
            },
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

impl Default for CellRenderer {
    fn default() -> Self {
        Self::new(DateFormat::Iso8601, false)
    }
}

/// 日付フォーマッター
///
/// Excelのシリアル日付値を文字列に変換します。
#[derive(Debug, Clone)]
pub(crate) struct DateFormatter {
    date_format: DateFormat,
}

impl DateFormatter {
    /// 日付値をフォーマット
    ///
    /// 変換できないシリアル値（負数、非有限値、範囲外）は空文字列になります。
    pub fn format(&self, serial_value: f64, is_1904: bool) -> String {
        let Some(datetime) = serial_to_datetime(serial_value, is_1904) else {
            return String::new();
        };

        match &self.date_format {
            DateFormat::Custom(format_str) => {
                let mut out = String::new();
                match write!(out, "{}", datetime.format(format_str)) {
                    Ok(()) => out,
                    Err(_) => String::new(),
                }
            }
            _ => {
                if datetime.num_seconds_from_midnight() == 0 {
                    datetime.format("%Y-%m-%d").to_string()
                } else {
                    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }
}

/// 数値フォーマッター
///
/// 整数値は小数部なし、それ以外は最短の往復可能な10進表記で出力します。
#[derive(Debug, Clone)]
pub(crate) struct NumberFormatter {
    thousands_separator: bool,
}

impl NumberFormatter {
    /// 数値をフォーマット
    pub fn format(&self, value: f64) -> String {
        let plain = plain_number(value);
        if self.thousands_separator {
            group_thousands(&plain)
        } else {
            plain
        }
    }
}

/// 数値を桁区切りなしの10進表記に変換（非有限値は空文字列）
fn plain_number(value: f64) -> String {
    if !value.is_finite() {
        String::new()
    } else if value == 0.0 {
        // -0.0 は "0" として出力
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// 整数部に3桁ごとのカンマを挿入する
fn group_thousands(plain: &str) -> String {
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(pos) => unsigned.split_at(pos),
        None => (unsigned, ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}{}", sign, grouped, frac_part)
}

/// エポック基準日を取得
///
/// - 1900年システム: 1899年12月30日起算（1900年うるう年バグを考慮し、
///   シリアル値60未満は1日補正する）
/// - 1904年システム: 1904年1月1日起算
fn epoch(is_1904: bool) -> Option<NaiveDate> {
    if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
}

/// Excelのシリアル値を日時に変換
pub(crate) fn serial_to_datetime(serial_value: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial_value.is_finite() || serial_value < 0.0 || serial_value > 2_958_466.0 {
        return None;
    }

    let mut days = serial_value.floor() as i64;
    let mut seconds = ((serial_value - serial_value.floor()) * SECONDS_PER_DAY).round() as i64;
    if seconds >= SECONDS_PER_DAY as i64 {
        days += 1;
        seconds = 0;
    }
    if !is_1904 && days < 60 {
        days += 1;
    }

    let date = epoch(is_1904)?.checked_add_signed(Duration::days(days))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)?;
    Some(NaiveDateTime::new(date, time))
}

/// 日時をExcelのシリアル値に変換
pub(crate) fn datetime_to_serial(datetime: NaiveDateTime, is_1904: bool) -> Option<f64> {
    let base = epoch(is_1904)?.and_hms_opt(0, 0, 0)?;
    let seconds = (datetime - base).num_seconds() as f64;
    let mut serial = seconds / SECONDS_PER_DAY;
    if !is_1904 && serial < 61.0 {
        serial -= 1.0;
    }
    if serial < 0.0 {
        None
    } else {
        Some(serial)
    }
}

/// ISO 8601形式の日付・日時文字列を解析
///
/// `2025-01-02`、`2025-01-02T03:04:05`、`2025-01-02 03:04:05.123`、末尾の`Z`を受け付けます。
pub(crate) fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let raw = text.trim().trim_end_matches('Z');
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(datetime);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
