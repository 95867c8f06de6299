//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得できない情報を抽出するモジュール。
//! ZIPアーカイブの安全性検査もここで行います。

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::XlsxToCsvError;
use crate::security::SecurityConfig;

/// アーカイブのメタデータ
#[derive(Debug, Clone, Default)]
pub(crate) struct ArchiveMetadata {
    /// 1904年エポックを使用するかどうか
    is_1904: bool,
}

impl ArchiveMetadata {
    /// XLSXファイル（ZIPアーカイブ）を検査し、メタデータを解析
    ///
    /// # 引数
    ///
    /// * `bytes` - XLSXファイルの内容
    /// * `security` - セキュリティ設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(ArchiveMetadata)` - 検査と解析に成功した場合
    /// * `Err(XlsxToCsvError::Zip)` - ZIPアーカイブとして読めない場合
    /// * `Err(XlsxToCsvError::SecurityViolation)` - 制限を超えるエントリがある場合
    pub fn parse(bytes: &[u8], security: &SecurityConfig) -> Result<Self, XlsxToCsvError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| XlsxToCsvError::Zip(e.to_string()))?;

        security.check_archive(&mut archive)?;

        let is_1904 = Self::parse_workbook(&mut archive)?;

        Ok(Self { is_1904 })
    }

    /// 1904年エポックを使用するか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// xl/workbook.xml の解析（プライベート）
    ///
    /// `<workbookPr date1904="true"/>` を解析し、1904年エポックフラグを取得します。
    fn parse_workbook(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<bool, XlsxToCsvError> {
        let mut workbook_file = match archive.by_name("xl/workbook.xml") {
            Ok(file) => file,
            // workbook.xmlが存在しない場合はcalamine側でエラーになる
            Err(_) => return Ok(false),
        };

        let mut xml_content = Vec::new();
        workbook_file.read_to_end(&mut xml_content)?;

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e))
                    if e.local_name().as_ref() == b"workbookPr" =>
                {
                    return date1904_attribute(&e);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxToCsvError::Zip(format!("XML parse error: {}", e))),
                _ => {}
            }
            buf.clear();
        }

        Ok(false)
    }
}

fn date1904_attribute(element: &BytesStart<'_>) -> Result<bool, XlsxToCsvError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| XlsxToCsvError::Zip(format!("XML attribute error: {}", e)))?;
        if attr.key.local_name().as_ref() == b"date1904" {
            let value = std::str::from_utf8(&attr.value)?;
            return Ok(value == "1" || value == "true");
        }
    }
    Ok(false)
}
