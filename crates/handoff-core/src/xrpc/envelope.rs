//! XML-RPC 1.0 envelopes for the property transport.
//!
//! Calls are `<methodCall>` documents and replies are `<methodResponse>`
//! documents, one value per reply. Faults carry a string `faultCode` so
//! error kinds survive the trip as names rather than numbers.
//!
//! Values map to and from [`serde_json::Value`]: string, int/i4, double,
//! boolean, array and struct. A `<value>` with bare text and no type
//! element is a string, per the XML-RPC spec.

use crate::{HandoffError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;

/// A decoded `<fault>` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Fault(Fault),
}

fn xml_err(err: quick_xml::Error) -> HandoffError {
    HandoffError::Xml {
        message: err.to_string(),
    }
}

fn malformed(message: impl Into<String>) -> HandoffError {
    HandoffError::Xml {
        message: message.into(),
    }
}

// --- encoding ---

type XmlWriter = Writer<Vec<u8>>;

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| xml_err(e.into()))
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| xml_err(e.into()))
}

fn text(w: &mut XmlWriter, content: &str) -> Result<()> {
    w.write_event(Event::Text(BytesText::new(content)))
        .map_err(|e| xml_err(e.into()))
}

fn scalar(w: &mut XmlWriter, tag: &str, content: &str) -> Result<()> {
    start(w, tag)?;
    text(w, content)?;
    end(w, tag)
}

fn write_value(w: &mut XmlWriter, value: &Value) -> Result<()> {
    start(w, "value")?;
    match value {
        Value::String(s) => scalar(w, "string", s)?,
        Value::Bool(b) => scalar(w, "boolean", if *b { "1" } else { "0" })?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                scalar(w, "int", &i.to_string())?;
            } else {
                scalar(w, "double", &n.to_string())?;
            }
        }
        Value::Array(items) => {
            start(w, "array")?;
            start(w, "data")?;
            for item in items {
                write_value(w, item)?;
            }
            end(w, "data")?;
            end(w, "array")?;
        }
        Value::Object(map) => {
            start(w, "struct")?;
            for (key, item) in map {
                start(w, "member")?;
                scalar(w, "name", key)?;
                write_value(w, item)?;
                end(w, "member")?;
            }
            end(w, "struct")?;
        }
        Value::Null => {
            return Err(HandoffError::Validation {
                field: "value".to_string(),
                message: "null has no XML-RPC representation".to_string(),
            })
        }
    }
    end(w, "value")
}

fn new_writer() -> Result<XmlWriter> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(|e| xml_err(e.into()))?;
    Ok(w)
}

/// Encode a `<methodCall>` document.
pub fn encode_call(method: &str, params: &[Value]) -> Result<Vec<u8>> {
    let mut w = new_writer()?;
    start(&mut w, "methodCall")?;
    scalar(&mut w, "methodName", method)?;
    start(&mut w, "params")?;
    for param in params {
        start(&mut w, "param")?;
        write_value(&mut w, param)?;
        end(&mut w, "param")?;
    }
    end(&mut w, "params")?;
    end(&mut w, "methodCall")?;
    Ok(w.into_inner())
}

/// Encode a successful `<methodResponse>` carrying one value.
pub fn encode_response(value: &Value) -> Result<Vec<u8>> {
    let mut w = new_writer()?;
    start(&mut w, "methodResponse")?;
    start(&mut w, "params")?;
    start(&mut w, "param")?;
    write_value(&mut w, value)?;
    end(&mut w, "param")?;
    end(&mut w, "params")?;
    end(&mut w, "methodResponse")?;
    Ok(w.into_inner())
}

/// Encode a `<fault>` response with a string fault code.
pub fn encode_fault(code: &str, message: &str) -> Result<Vec<u8>> {
    let mut w = new_writer()?;
    start(&mut w, "methodResponse")?;
    start(&mut w, "fault")?;
    start(&mut w, "value")?;
    start(&mut w, "struct")?;

    start(&mut w, "member")?;
    scalar(&mut w, "name", "faultCode")?;
    start(&mut w, "value")?;
    scalar(&mut w, "string", code)?;
    end(&mut w, "value")?;
    end(&mut w, "member")?;

    start(&mut w, "member")?;
    scalar(&mut w, "name", "faultString")?;
    start(&mut w, "value")?;
    scalar(&mut w, "string", message)?;
    end(&mut w, "value")?;
    end(&mut w, "member")?;

    end(&mut w, "struct")?;
    end(&mut w, "value")?;
    end(&mut w, "fault")?;
    end(&mut w, "methodResponse")?;
    Ok(w.into_inner())
}

// --- decoding ---

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

enum Node {
    Start(String),
    End(String),
    Text(String),
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            reader: Reader::from_reader(input),
        }
    }

    /// Next node, skipping declarations and comments. Text is delivered
    /// verbatim; the reader never trims, because whitespace inside a
    /// string value is payload. Formatting whitespace between elements
    /// is dropped at the structural call sites instead.
    fn next(&mut self) -> Result<Node> {
        loop {
            match self.reader.read_event().map_err(xml_err)? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Ok(Node::Start(name));
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Ok(Node::End(name));
                }
                Event::Empty(e) => {
                    // Treat <tag/> as an immediately closed element.
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Ok(Node::Start(name));
                }
                Event::Text(t) => {
                    return Ok(Node::Text(String::from_utf8_lossy(&t).into_owned()));
                }
                // The reader splits text at entity references and hands
                // them over as their own events.
                Event::GeneralRef(r) => {
                    if let Some(ch) = r.resolve_char_ref().map_err(xml_err)? {
                        return Ok(Node::Text(ch.to_string()));
                    }
                    let resolved = match r.as_ref() {
                        b"lt" => "<",
                        b"gt" => ">",
                        b"amp" => "&",
                        b"apos" => "'",
                        b"quot" => "\"",
                        other => {
                            return Err(malformed(format!(
                                "unknown entity &{};",
                                String::from_utf8_lossy(other)
                            )))
                        }
                    };
                    return Ok(Node::Text(resolved.to_string()));
                }
                Event::CData(t) => {
                    return Ok(Node::Text(String::from_utf8_lossy(&t).into_owned()));
                }
                Event::Eof => return Err(malformed("unexpected end of document")),
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            }
        }
    }

    /// Next node where markup is expected. Whitespace-only text between
    /// tags is formatting, not content, and is skipped here.
    fn next_markup(&mut self) -> Result<Node> {
        loop {
            match self.next()? {
                Node::Text(t) if t.trim().is_empty() => continue,
                node => return Ok(node),
            }
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<()> {
        match self.next_markup()? {
            Node::Start(n) if n == name => Ok(()),
            Node::Start(n) => Err(malformed(format!("expected <{name}>, found <{n}>"))),
            Node::End(n) => Err(malformed(format!("expected <{name}>, found </{n}>"))),
            Node::Text(_) => Err(malformed(format!("expected <{name}>, found text"))),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<()> {
        match self.next_markup()? {
            Node::End(n) if n == name => Ok(()),
            _ => Err(malformed(format!("expected </{name}>"))),
        }
    }

    /// Text content of the current element up to its closing tag.
    fn read_text(&mut self, closing: &str) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.next()? {
                Node::Text(t) => out.push_str(&t),
                Node::End(n) if n == closing => return Ok(out),
                Node::End(n) => return Err(malformed(format!("unexpected </{n}>"))),
                Node::Start(n) => return Err(malformed(format!("unexpected <{n}> in text"))),
            }
        }
    }

    /// Parse the inside of a `<value>` whose start tag is already consumed.
    ///
    /// Untyped content is read verbatim as a string. Text seen before a
    /// type tag is only formatting if it is all whitespace.
    fn read_value_body(&mut self) -> Result<Value> {
        let mut text = String::new();
        let tag = loop {
            match self.next()? {
                Node::Text(t) => text.push_str(&t),
                // <value></value> is the empty string.
                Node::End(n) if n == "value" => return Ok(Value::String(text)),
                Node::End(n) => return Err(malformed(format!("unexpected </{n}>"))),
                Node::Start(tag) if text.trim().is_empty() => break tag,
                Node::Start(n) => return Err(malformed(format!("unexpected <{n}> in text"))),
            }
        };
        let value = match tag.as_str() {
            "string" => Value::String(self.read_text("string")?),
            "int" | "i4" => {
                let t = self.read_text(&tag)?;
                let n: i64 = t
                    .trim()
                    .parse()
                    .map_err(|_| malformed(format!("bad integer {t:?}")))?;
                Value::from(n)
            }
            "double" => {
                let t = self.read_text(&tag)?;
                let n: f64 = t
                    .trim()
                    .parse()
                    .map_err(|_| malformed(format!("bad double {t:?}")))?;
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| malformed("non-finite double"))?
            }
            "boolean" => {
                let t = self.read_text("boolean")?;
                match t.trim() {
                    "1" => Value::Bool(true),
                    "0" => Value::Bool(false),
                    other => return Err(malformed(format!("bad boolean {other:?}"))),
                }
            }
            "array" => {
                self.expect_start("data")?;
                let mut items = Vec::new();
                loop {
                    match self.next_markup()? {
                        Node::Start(n) if n == "value" => items.push(self.read_value_body()?),
                        Node::End(n) if n == "data" => break,
                        _ => return Err(malformed("malformed <array>")),
                    }
                }
                self.expect_end("array")?;
                Value::Array(items)
            }
            "struct" => {
                let mut map = serde_json::Map::new();
                loop {
                    match self.next_markup()? {
                        Node::Start(n) if n == "member" => {
                            self.expect_start("name")?;
                            let key = self.read_text("name")?;
                            self.expect_start("value")?;
                            let value = self.read_value_body()?;
                            self.expect_end("member")?;
                            map.insert(key, value);
                        }
                        Node::End(n) if n == "struct" => break,
                        _ => return Err(malformed("malformed <struct>")),
                    }
                }
                Value::Object(map)
            }
            other => return Err(malformed(format!("unsupported type <{other}>"))),
        };
        self.expect_end("value")?;
        Ok(value)
    }

    fn read_value(&mut self) -> Result<Value> {
        self.expect_start("value")?;
        self.read_value_body()
    }
}

/// Decode a `<methodCall>` into a method name and its parameters.
pub fn decode_call(input: &[u8]) -> Result<(String, Vec<Value>)> {
    let mut p = Parser::new(input);
    p.expect_start("methodCall")?;
    p.expect_start("methodName")?;
    let method = p.read_text("methodName")?;
    p.expect_start("params")?;
    let mut params = Vec::new();
    loop {
        match p.next_markup()? {
            Node::Start(n) if n == "param" => {
                params.push(p.read_value()?);
                p.expect_end("param")?;
            }
            Node::End(n) if n == "params" => break,
            _ => return Err(malformed("malformed <params>")),
        }
    }
    p.expect_end("methodCall")?;
    Ok((method, params))
}

/// Decode a `<methodResponse>` into a success value or a fault.
pub fn decode_response(input: &[u8]) -> Result<Response> {
    let mut p = Parser::new(input);
    p.expect_start("methodResponse")?;
    match p.next_markup()? {
        Node::Start(n) if n == "params" => {
            p.expect_start("param")?;
            let value = p.read_value()?;
            p.expect_end("param")?;
            p.expect_end("params")?;
            p.expect_end("methodResponse")?;
            Ok(Response::Success(value))
        }
        Node::Start(n) if n == "fault" => {
            let body = p.read_value()?;
            p.expect_end("fault")?;
            p.expect_end("methodResponse")?;
            let map = body.as_object().ok_or_else(|| malformed("fault is not a struct"))?;
            let code = map
                .get("faultCode")
                .and_then(field_as_string)
                .ok_or_else(|| malformed("fault missing faultCode"))?;
            let message = map
                .get("faultString")
                .and_then(field_as_string)
                .unwrap_or_default();
            Ok(Response::Fault(Fault { code, message }))
        }
        _ => Err(malformed("malformed <methodResponse>")),
    }
}

// Numeric fault codes from foreign peers are stringified.
fn field_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
