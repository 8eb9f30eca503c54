//! Streaming `sst` XML serializer
//!
//! Output shape:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>\r\n
//! <sst count="N" uniqueCount="U" xmlns="...spreadsheetml/2006/main">
//! <si>key 0</si><si>key 1</si>...
//! </sst>
//! ```
//!
//! No whitespace is emitted between elements. An empty table is a single
//! self-closed root. Keys are written verbatim: they are canonical XML
//! already. Items are pulled one at a time from the reverse store and pushed
//! through a buffered writer, so the document is never held in memory.

use std::io::{BufWriter, Write};

use super::counters::Counters;
use super::errors::{TableError, TableResult};
use crate::storage::StorageResult;

/// Namespace of the SpreadsheetML main part
pub const SPREADSHEETML_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n";

/// Writes the whole table to `sink`, returning the number of bytes written.
///
/// `items` must yield `(id, key)` in ascending id order, exactly
/// `counters.unique_count()` of them.
pub fn write_sst<W, I>(sink: W, counters: Counters, items: I) -> TableResult<u64>
where
    W: Write,
    I: IntoIterator<Item = StorageResult<(u32, String)>>,
{
    let mut writer = SstWriter::new(sink);
    writer.start(counters)?;

    if counters.unique_count() > 0 {
        let mut expected = 0u32;
        for item in items {
            let (id, key) = item?;
            if id != expected {
                return Err(TableError::Inconsistent(format!(
                    "reverse store yielded id {} where {} was expected",
                    id, expected
                )));
            }
            writer.item(&key)?;
            expected += 1;
            if expected == counters.unique_count() {
                break;
            }
        }
        if expected != counters.unique_count() {
            return Err(TableError::Inconsistent(format!(
                "reverse store yielded {} keys, unique count is {}",
                expected,
                counters.unique_count()
            )));
        }
    }

    writer.finish(counters)
}

struct SstWriter<W: Write> {
    out: BufWriter<W>,
    written: u64,
}

impl<W: Write> SstWriter<W> {
    fn new(sink: W) -> Self {
        Self {
            out: BufWriter::new(sink),
            written: 0,
        }
    }

    fn write(&mut self, text: &str) -> TableResult<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(TableError::Serialization)?;
        self.written += text.len() as u64;
        Ok(())
    }

    fn start(&mut self, counters: Counters) -> TableResult<()> {
        let self_closing = if counters.unique_count() == 0 { "/" } else { "" };
        self.write(XML_DECLARATION)?;
        self.write(&format!(
            "<sst count=\"{}\" uniqueCount=\"{}\" xmlns=\"{}\"{}>",
            counters.count(),
            counters.unique_count(),
            SPREADSHEETML_NAMESPACE,
            self_closing
        ))
    }

    fn item(&mut self, key: &str) -> TableResult<()> {
        self.write("<si>")?;
        self.write(key)?;
        self.write("</si>")
    }

    fn finish(mut self, counters: Counters) -> TableResult<u64> {
        if counters.unique_count() > 0 {
            self.write("</sst>")?;
        }
        self.out.flush().map_err(TableError::Serialization)?;
        Ok(self.written)
    }
}
