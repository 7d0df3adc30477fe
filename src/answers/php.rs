// src/answers/php.rs

//! Reader and writer for the legacy `serialize()` byte grammar used by the
//! quiz engine and the CMS meta tables.
//!
//! Supported productions: `N;`, `b:0|1;`, `i:<int>;`, `d:<float>;`,
//! `s:<bytes>:"…";`, `a:<n>:{…}` and `O:<len>:"Class":<n>:{…}`.
//! String lengths count bytes, not characters.

use super::value::{Value, format_float};

const MAX_DEPTH: usize = 256;

/// Parses a complete serialized value. Trailing bytes after the first value are ignored.
///
/// Never panics; any malformed input yields `None`.
pub fn unserialize(input: &str) -> Option<Value> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    parser.value()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Option<Value> {
        let tag = *self.bytes.get(self.pos)?;
        self.pos += 1;

        match tag {
            b'N' => {
                self.expect(b';')?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let v = match self.take_until(b';')? {
                    "0" => false,
                    "1" => true,
                    _ => return None,
                };
                Some(Value::Bool(v))
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.take_until(b';')?;
                raw.strip_prefix('+')
                    .unwrap_or(raw)
                    .parse::<i64>()
                    .ok()
                    .map(Value::Int)
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.take_until(b';')?;
                let f = match raw {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    _ => raw.parse::<f64>().ok()?,
                };
                Some(Value::Float(f))
            }
            b's' => {
                self.expect(b':')?;
                let s = self.string_body()?;
                self.expect(b';')?;
                Some(Value::Text(s))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.count()?;
                self.expect(b'{')?;
                let entries = self.entries(count)?;
                self.expect(b'}')?;

                let dense = entries
                    .iter()
                    .enumerate()
                    .all(|(i, (k, _))| *k == i.to_string());
                if dense {
                    Some(Value::List(entries.into_iter().map(|(_, v)| v).collect()))
                } else {
                    Some(Value::Map(entries))
                }
            }
            b'O' => {
                self.expect(b':')?;
                let class = self.string_body()?;
                self.expect(b':')?;
                let count = self.count()?;
                self.expect(b'{')?;
                let fields = self.entries(count)?;
                self.expect(b'}')?;
                Some(Value::Object { class, fields })
            }
            _ => None,
        }
    }

    fn entries(&mut self, count: usize) -> Option<Vec<(String, Value)>> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return None;
        }

        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = match self.value()? {
                Value::Int(i) => i.to_string(),
                Value::Text(s) => s,
                _ => return None,
            };
            let value = self.value()?;
            entries.push((key, value));
        }

        self.depth -= 1;
        Some(entries)
    }

    /// `<len>:"<len bytes>"`
    fn string_body(&mut self) -> Option<String> {
        let len = self.count()?;
        self.expect(b'"')?;
        let end = self.pos.checked_add(len)?;
        let raw = self.bytes.get(self.pos..end)?;
        self.pos = end;
        self.expect(b'"')?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }

    /// `<unsigned>:` as used before strings and element counts.
    fn count(&mut self) -> Option<usize> {
        let raw = self.take_until(b':')?;
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }

    fn take_until(&mut self, delim: u8) -> Option<&'a str> {
        let bytes = self.bytes;
        let rest = bytes.get(self.pos..)?;
        let offset = rest.iter().position(|b| *b == delim)?;
        let token = std::str::from_utf8(&rest[..offset]).ok()?;
        self.pos += offset + 1;
        Some(token)
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }
}

/// Writes a value in the same grammar `unserialize` reads.
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        Value::Int(i) => out.push_str(&format!("i:{i};")),
        Value::Float(f) => {
            let body = if f.is_nan() {
                "NAN".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 { "INF" } else { "-INF" }.to_string()
            } else {
                format_float(*f)
            };
            out.push_str(&format!("d:{body};"));
        }
        Value::Text(s) => write_string(out, s),
        Value::List(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{i};"));
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Map(entries) => {
            out.push_str(&format!("a:{}:{{", entries.len()));
            write_entries(out, entries);
            out.push('}');
        }
        Value::Object { class, fields } => {
            out.push_str(&format!("O:{}:\"{}\":{}:{{", class.len(), class, fields.len()));
            write_entries(out, fields);
            out.push('}');
        }
    }
}

fn write_entries(out: &mut String, entries: &[(String, Value)]) {
    for (key, item) in entries {
        match canonical_int_key(key) {
            Some(i) => out.push_str(&format!("i:{i};")),
            None => write_string(out, key),
        }
        write_value(out, item);
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
}

/// Keys such as `"7"` are stored as integers; `"07"` or `"-0"` stay strings.
fn canonical_int_key(key: &str) -> Option<i64> {
    let i = key.parse::<i64>().ok()?;
    (i.to_string() == key).then_some(i)
}
