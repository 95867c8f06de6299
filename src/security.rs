//! Security Module
//!
//! 入力ペイロードとZIPアーカイブに対する制限を実装するモジュール。
//! 過大な入力、ZIP bomb攻撃、パストラバーサル攻撃への対策を提供します。

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::XlsxToCsvError;

/// セキュリティ設定
///
/// ファイル処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 入力ペイロードの最大サイズ（バイト）
    /// デフォルト: 20MiB
    pub max_input_size: u64,
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一ファイルの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_size: 20 * 1024 * 1024,
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600, // 100MB
        }
    }
}

impl SecurityConfig {
    /// 入力を上限+1バイトまで読み込み、上限を超える場合はエラーを返す
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<u8>)` - 読み込んだペイロード
    /// * `Err(XlsxToCsvError::SecurityViolation)` - ペイロードが上限を超える場合
    pub fn read_input<R: Read>(&self, reader: R) -> Result<Vec<u8>, XlsxToCsvError> {
        let mut buffer = Vec::new();
        reader
            .take(self.max_input_size.saturating_add(1))
            .read_to_end(&mut buffer)?;

        if buffer.len() as u64 > self.max_input_size {
            return Err(XlsxToCsvError::SecurityViolation(format!(
                "Input size exceeds maximum: more than {} bytes",
                self.max_input_size
            )));
        }
        Ok(buffer)
    }

    /// ZIPアーカイブのエントリを検証
    ///
    /// エントリ数、各エントリの展開後サイズ、合計サイズ、パスを検査します。
    pub fn check_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), XlsxToCsvError> {
        if archive.len() > self.max_file_count {
            return Err(XlsxToCsvError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                self.max_file_count
            )));
        }

        let mut total_size: u64 = 0;
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| XlsxToCsvError::Zip(e.to_string()))?;

            validate_zip_path(file.name()).map_err(XlsxToCsvError::SecurityViolation)?;

            if file.size() > self.max_file_size {
                return Err(XlsxToCsvError::SecurityViolation(format!(
                    "ZIP entry {} exceeds maximum size: {} bytes (max: {} bytes)",
                    file.name(),
                    file.size(),
                    self.max_file_size
                )));
            }

            total_size = total_size.saturating_add(file.size());
            if total_size > self.max_decompressed_size {
                return Err(XlsxToCsvError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes",
                    self.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、ZIPエントリのパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するファイルパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式のドライブレターやUnix形式の`/`で始まるパス）
    let bytes = path.as_bytes();
    let has_drive_letter = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with('/') || has_drive_letter {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    fn archive_with(entries: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("xl/workbook.xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.xml").is_ok());
        assert!(validate_zip_path("xl/sharedStrings.xml").is_ok());
        assert!(validate_zip_path("docProps/app..xml").is_ok());
    }

    #[test]
    fn test_validate_zip_path_empty() {
        assert!(validate_zip_path("").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute() {
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("C:\\Windows\\system32").is_err());
        assert!(validate_zip_path("d:/xl/workbook.xml").is_err());
    }

    #[test]
    fn test_validate_zip_path_traversal() {
        assert!(validate_zip_path("../etc/passwd").is_err());
        assert!(validate_zip_path("xl/../../etc/passwd").is_err());
        assert!(validate_zip_path("xl/..").is_err());
    }

    #[test]
    fn test_validate_zip_path_backslash() {
        assert!(validate_zip_path("xl\\workbook.xml").is_err());
    }

    #[test]
    fn test_read_input_within_limit() {
        let config = SecurityConfig {
            max_input_size: 4,
            ..Default::default()
        };
        assert_eq!(config.read_input(&b"abcd"[..]).unwrap(), b"abcd");
    }

    #[test]
    fn test_read_input_exceeding_limit() {
        let config = SecurityConfig {
            max_input_size: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.read_input(&b"abcde"[..]),
            Err(XlsxToCsvError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_check_archive_file_count() {
        let mut archive = archive_with(&[
            ("a.xml", &b"a"[..]),
            ("b.xml", &b"b"[..]),
            ("c.xml", &b"c"[..]),
        ]);
        let config = SecurityConfig {
            max_file_count: 2,
            ..Default::default()
        };
        assert!(config.check_archive(&mut archive).is_err());
        assert!(SecurityConfig::default().check_archive(&mut archive).is_ok());
    }

    #[test]
    fn test_check_archive_entry_size() {
        let mut archive = archive_with(&[("big.xml", &[b'x'; 64][..])]);
        let config = SecurityConfig {
            max_file_size: 32,
            ..Default::default()
        };
        assert!(matches!(
            config.check_archive(&mut archive),
            Err(XlsxToCsvError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_check_archive_total_size() {
        let mut archive = archive_with(&[("a.xml", &[b'x'; 40][..]), ("b.xml", &[b'y'; 40][..])]);
        let config = SecurityConfig {
            max_decompressed_size: 64,
            ..Default::default()
        };
        assert!(config.check_archive(&mut archive).is_err());
    }

    #[test]
    fn test_check_archive_rejects_traversal_entry() {
        let mut archive = archive_with(&[("../evil.xml", &b"x"[..])]);
        assert!(SecurityConfig::default().check_archive(&mut archive).is_err());
    }
}
