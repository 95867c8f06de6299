//! Parser Module
//!
//! calamineを使用したXLSXファイルのデコードと、アーカイブの検査を提供します。

mod metadata;
mod workbook;

pub(crate) use metadata::ArchiveMetadata;
pub(crate) use workbook::WorkbookParser;
