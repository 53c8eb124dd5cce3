use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

type ChainReader = Chain<Cursor<Vec<u8>>, File>;

const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Streaming reader over a possibly compressed input file
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) compression using magic bytes
pub enum DecompressionReader {
    Gzip(BufReader<MultiGzDecoder<ChainReader>>),
    Zstd(BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>),
    Plain(BufReader<ChainReader>),
}

// Manually implement Debug since zstd::Decoder doesn't implement it
impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
            DecompressionReader::Plain(_) => write!(f, "DecompressionReader::Plain"),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
            DecompressionReader::Plain(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
            DecompressionReader::Plain(reader) => reader.consume(amt),
        }
    }
}

impl DecompressionReader {
    /// Open `path`, choosing a decoder from the file's leading bytes
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            if extension.eq_ignore_ascii_case("zip") {
                return Err(anyhow!(
                    "ZIP archives are not supported, only gzip and zstd. Extract it first: unzip {}",
                    path.display()
                ));
            }
        }

        let mut file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;

        let mut head = [0u8; 4];
        let n = read_head(&mut file, &mut head)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;

        // Put the sniffed bytes back in front of the stream
        let chained = Cursor::new(head[..n].to_vec()).chain(file);

        if n >= 3 && head[..3] == GZIP_MAGIC {
            Ok(DecompressionReader::Gzip(BufReader::new(MultiGzDecoder::new(chained))))
        } else if n >= 4 && head == ZSTD_MAGIC {
            let decoder = zstd::Decoder::new(chained)
                .with_context(|| format!("Failed to start zstd decoder for {}", path.display()))?;
            Ok(DecompressionReader::Zstd(BufReader::new(decoder)))
        } else {
            Ok(DecompressionReader::Plain(BufReader::new(chained)))
        }
    }
}

/// Fill `head` as far as the file allows; short files are fine
fn read_head(file: &mut File, head: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(reader: &mut DecompressionReader) -> String {
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_plain_file_passthrough() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "value")?;
        writeln!(temp_file, "\"{{\"\"text\"\":\"\"hi\"\"}}\"")?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Plain(_)));
        assert!(read_all(&mut reader).starts_with("value\n"));
        Ok(())
    }

    #[test]
    fn test_tiny_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "v")?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert_eq!(read_all(&mut reader), "v");
        Ok(())
    }

    #[test]
    fn test_gzip_detected_by_magic_bytes() -> Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"value\nrow one\n")?;
        let compressed = encoder.finish()?;

        // No .gz extension on purpose
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Gzip(_)));
        assert_eq!(read_all(&mut reader), "value\nrow one\n");
        Ok(())
    }

    #[test]
    fn test_zstd_detected_by_magic_bytes() -> Result<()> {
        let compressed = zstd::encode_all(&b"value\nrow one\n"[..], 3)?;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Zstd(_)));
        assert_eq!(read_all(&mut reader), "value\nrow one\n");
        Ok(())
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = DecompressionReader::open("/definitely/not/here.csv").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_zip_file_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("tweets.zip");
        std::fs::write(&zip_path, b"PK fake zip").unwrap();

        let err = DecompressionReader::open(&zip_path).unwrap_err().to_string();
        assert!(err.contains("ZIP archives are not supported"));
    }
}
