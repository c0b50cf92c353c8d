use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub description: Option<String>,
    pub sequence: String,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    line_buf: String,
    pending_header: Option<String>,
    line_number: usize,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(256),
            pending_header: None,
            line_number: 0,
        }
    }

    pub fn read_next(&mut self) -> io::Result<Option<FastaRecord>> {
        let header = match self.pending_header.take() {
            Some(header) => header,
            None => loop {
                self.line_buf.clear();
                if self.reader.read_line(&mut self.line_buf)? == 0 {
                    return Ok(None);
                }
                self.line_number += 1;
                let line = self.line_buf.trim_end();
                if line.is_empty() {
                    continue;
                }
                match line.strip_prefix('>') {
                    Some(header) => break header.to_string(),
                    None => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("line {}: sequence data before first header", self.line_number),
                        ));
                    }
                }
            },
        };

        let mut sequence = String::new();
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }
            self.line_number += 1;
            let line = self.line_buf.trim();
            if let Some(next) = line.strip_prefix('>') {
                self.pending_header = Some(next.to_string());
                break;
            }
            sequence.push_str(line);
        }

        let (id, description) = split_header(&header);
        Ok(Some(FastaRecord {
            id,
            description,
            sequence,
        }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = io::Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

fn split_header(header: &str) -> (String, Option<String>) {
    let header = header.trim();
    match header.split_once(char::is_whitespace) {
        Some((id, rest)) => {
            let rest = rest.trim();
            let description = (!rest.is_empty()).then(|| rest.to_string());
            (id.to_string(), description)
        }
        None => (header.to_string(), None),
    }
}

pub fn write_records<'a, W, I>(writer: &mut W, records: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut written = 0;
    for (id, sequence) in records {
        writeln!(writer, ">{id}")?;
        writeln!(writer, "{sequence}")?;
        written += 1;
    }
    Ok(written)
}
