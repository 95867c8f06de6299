//! Sheet Selector Module
//!
//! ユーザーが指定したシート参照（1始まりのインデックスまたはシート名）を、
//! ワークブックのシート一覧に対して解決するモジュール。

use crate::api::SheetRef;
use crate::error::XlsxToCsvError;
use crate::types::{Sheet, Workbook};

/// シート参照を解決し、0始まりのシートインデックスを返す
///
/// # 引数
///
/// * `names` - ワークブック内のシート名（順序どおり）
/// * `reference` - シート参照（Noneの場合は最初のシート）
///
/// # 戻り値
///
/// * `Ok(usize)` - 選択されたシートのインデックス（0始まり）
/// * `Err(XlsxToCsvError::SheetNotFound)` - インデックスが範囲外、または名前が一致しない場合
pub(crate) fn resolve_sheet_index(
    names: &[String],
    reference: Option<&SheetRef>,
) -> Result<usize, XlsxToCsvError> {
    let not_found = |reference: String| XlsxToCsvError::SheetNotFound {
        reference,
        available: names.to_vec(),
    };

    match reference.map(SheetRef::normalized) {
        None => {
            if names.is_empty() {
                Err(not_found("index 1".to_string()))
            } else {
                Ok(0)
            }
        }
        Some(SheetRef::Index(index)) => {
            if index < 1 || index as u64 > names.len() as u64 {
                return Err(not_found(SheetRef::Index(index).to_string()));
            }
            Ok((index - 1) as usize)
        }
        Some(SheetRef::Name(name)) => names
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| not_found(SheetRef::Name(name).to_string())),
    }
}

impl Workbook {
    /// シート参照に一致するシートを取得
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxcsv::{Sheet, SheetRef, Workbook};
    ///
    /// let workbook = Workbook::new(vec![Sheet::new("Sheet1"), Sheet::new("Sheet2")]);
    /// assert_eq!(workbook.sheet(Some(&SheetRef::Index(2))).unwrap().name(), "Sheet2");
    /// assert!(workbook.sheet(Some(&SheetRef::Index(3))).is_err());
    /// ```
    pub fn sheet(&self, reference: Option<&SheetRef>) -> Result<&Sheet, XlsxToCsvError> {
        let index = resolve_sheet_index(&self.sheet_names(), reference)?;
        Ok(&self.sheets()[index])
    }
}
