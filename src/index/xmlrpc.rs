// src/index/xmlrpc.rs
//! Minimal XML-RPC client for the package index.
//!
//! Requests are written by hand; responses are tokenized with quick-xml and
//! parsed by recursive descent. Only the value types the index returns are
//! supported.

use std::collections::BTreeMap;

use async_trait::async_trait;
use metrics::counter;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;

use crate::error::{Error, Result};
use crate::index::types::{ChangeEvent, PackageMetadata};
use crate::index::{PackageIndex, ReleaseSource};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    Str(String),
    DateTime(String),
    Base64(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

// ------------------------------------------------------------
// Request encoding
// ------------------------------------------------------------

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for p in params {
        out.push_str("<param>");
        write_value(&mut out, p);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, v: &Value) {
    out.push_str("<value>");
    match v {
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        Value::Str(s) => out.push_str(&format!("<string>{}</string>", escape(s.as_str()))),
        Value::DateTime(s) => out.push_str(&format!(
            "<dateTime.iso8601>{}</dateTime.iso8601>",
            escape(s.as_str())
        )),
        Value::Base64(s) => out.push_str(&format!("<base64>{s}</base64>")),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for it in items {
                write_value(out, it);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (k, v) in members {
                out.push_str(&format!("<member><name>{}</name>", escape(k.as_str())));
                write_value(out, v);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

// ------------------------------------------------------------
// Response decoding
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn tokenize(xml: &str) -> Result<Vec<Tok>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out: Vec<Tok> = Vec::new();
    loop {
        let tok = match reader.read_event() {
            Ok(Event::Start(e)) => Tok::Open(tag_name(e.name().as_ref())),
            Ok(Event::End(e)) => Tok::Close(tag_name(e.name().as_ref())),
            Ok(Event::Empty(e)) => Tok::Empty(tag_name(e.name().as_ref())),
            Ok(Event::Text(t)) => {
                let s = t
                    .unescape()
                    .map_err(|e| Error::Decode(format!("bad text node: {e}")))?;
                Tok::Text(s.into_owned())
            }
            Ok(Event::CData(c)) => Tok::Text(String::from_utf8_lossy(&c.into_inner()).into_owned()),
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                return Err(Error::Decode(format!(
                    "xml error at {}: {e}",
                    reader.buffer_position()
                )))
            }
        };
        // CDATA next to plain text arrives as two events.
        if let (Tok::Text(more), Some(Tok::Text(prev))) = (&tok, out.last_mut()) {
            prev.push_str(more);
            continue;
        }
        out.push(tok);
    }
    Ok(out)
}

fn unexpected(expected: &str, found: Option<Tok>) -> Error {
    Error::Decode(format!("expected {expected}, found {found:?}"))
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(toks: Vec<Tok>) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_close(&self, tag: &str) -> bool {
        matches!(self.peek(), Some(Tok::Close(t)) if t == tag)
    }

    fn expect_open(&mut self, tag: &str) -> Result<()> {
        match self.bump() {
            Some(Tok::Open(t)) if t == tag => Ok(()),
            other => Err(unexpected(&format!("<{tag}>"), other)),
        }
    }

    fn expect_close(&mut self, tag: &str) -> Result<()> {
        match self.bump() {
            Some(Tok::Close(t)) if t == tag => Ok(()),
            other => Err(unexpected(&format!("</{tag}>"), other)),
        }
    }

    /// Text content (possibly empty) followed by `</tag>`.
    fn text_until_close(&mut self, tag: &str) -> Result<String> {
        let text = match self.peek() {
            Some(Tok::Text(_)) => match self.bump() {
                Some(Tok::Text(s)) => s,
                _ => String::new(),
            },
            _ => String::new(),
        };
        self.expect_close(tag)?;
        Ok(text)
    }

    fn value(&mut self) -> Result<Value> {
        match self.bump() {
            Some(Tok::Empty(t)) if t == "value" => return Ok(Value::Str(String::new())),
            Some(Tok::Open(t)) if t == "value" => {}
            other => return Err(unexpected("<value>", other)),
        }
        let v = match self.bump() {
            // An untyped value is a string.
            Some(Tok::Close(t)) if t == "value" => return Ok(Value::Str(String::new())),
            Some(Tok::Text(s)) => Value::Str(s),
            Some(Tok::Empty(t)) => empty_typed(&t)?,
            Some(Tok::Open(t)) => self.typed(&t)?,
            other => return Err(unexpected("value content", other)),
        };
        self.expect_close("value")?;
        Ok(v)
    }

    fn typed(&mut self, tag: &str) -> Result<Value> {
        match tag {
            "array" => self.array(),
            "struct" => self.members(),
            "nil" => {
                self.expect_close("nil")?;
                Ok(Value::Nil)
            }
            _ => {
                let text = self.text_until_close(tag)?;
                scalar(tag, text)
            }
        }
    }

    fn array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        match self.bump() {
            Some(Tok::Empty(t)) if t == "data" => {}
            Some(Tok::Open(t)) if t == "data" => {
                while !self.at_close("data") {
                    items.push(self.value()?);
                }
                self.expect_close("data")?;
            }
            other => return Err(unexpected("<data>", other)),
        }
        self.expect_close("array")?;
        Ok(Value::Array(items))
    }

    fn members(&mut self) -> Result<Value> {
        let mut map = BTreeMap::new();
        while !self.at_close("struct") {
            self.expect_open("member")?;
            self.expect_open("name")?;
            let key = self.text_until_close("name")?;
            let v = self.value()?;
            self.expect_close("member")?;
            map.insert(key, v);
        }
        self.expect_close("struct")?;
        Ok(Value::Struct(map))
    }
}

fn empty_typed(tag: &str) -> Result<Value> {
    match tag {
        "nil" => Ok(Value::Nil),
        "string" => Ok(Value::Str(String::new())),
        "base64" => Ok(Value::Base64(String::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        other => Err(Error::Decode(format!("empty <{other}/> carries no value"))),
    }
}

fn scalar(tag: &str, text: String) -> Result<Value> {
    let bad = |e: &dyn std::fmt::Display| Error::Decode(format!("bad <{tag}> {text:?}: {e}"));
    match tag {
        "int" | "i4" | "i8" => text.trim().parse().map(Value::Int).map_err(|e| bad(&e)),
        "double" => text.trim().parse().map(Value::Double).map_err(|e| bad(&e)),
        "boolean" => match text.trim() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            _ => Err(bad(&"expected 0 or 1")),
        },
        "string" => Ok(Value::Str(text)),
        "dateTime.iso8601" => Ok(Value::DateTime(text)),
        "base64" => Ok(Value::Base64(text)),
        other => Err(Error::Decode(format!("unsupported type <{other}>"))),
    }
}

fn fault_from(v: &Value) -> Error {
    let Value::Struct(m) = v else {
        return Error::Decode(format!("fault without struct: {v:?}"));
    };
    Error::Fault {
        code: m.get("faultCode").and_then(Value::as_i64).unwrap_or_default(),
        message: m
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Decode a `methodResponse`. A `<fault>` becomes `Error::Fault`.
pub fn parse_response(xml: &str) -> Result<Value> {
    let mut p = Parser::new(tokenize(xml)?);
    p.expect_open("methodResponse")?;
    match p.bump() {
        Some(Tok::Open(t)) if t == "params" => {
            p.expect_open("param")?;
            let v = p.value()?;
            p.expect_close("param")?;
            p.expect_close("params")?;
            Ok(v)
        }
        Some(Tok::Open(t)) if t == "fault" => Err(fault_from(&p.value()?)),
        other => Err(unexpected("<params> or <fault>", other)),
    }
}

// ------------------------------------------------------------
// Index-specific decoding
// ------------------------------------------------------------

/// `[name, version, timestamp, actions]` -> event.
pub fn change_event_from_row(row: &Value) -> Result<ChangeEvent> {
    let Value::Array(fields) = row else {
        return Err(Error::MalformedEvent(format!("expected array, got {row:?}")));
    };
    if fields.len() < 4 {
        return Err(Error::MalformedEvent(format!(
            "expected 4 fields, got {}",
            fields.len()
        )));
    }
    let name = fields[0]
        .as_str()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::MalformedEvent(format!("missing name in {row:?}")))?;
    let version = match &fields[1] {
        Value::Str(v) if !v.trim().is_empty() => Some(v.as_str()),
        Value::Str(_) | Value::Nil => None,
        other => {
            return Err(Error::MalformedEvent(format!(
                "bad version {other:?} for {name}"
            )))
        }
    };
    let timestamp = fields[2]
        .as_i64()
        .ok_or_else(|| Error::MalformedEvent(format!("bad timestamp for {name}")))?;
    let actions = fields[3]
        .as_str()
        .ok_or_else(|| Error::MalformedEvent(format!("bad actions for {name}")))?;
    Ok(ChangeEvent::new(name, version, timestamp, actions))
}

/// Decode changelog rows, skipping the malformed ones.
pub fn events_from_rows(rows: &[Value]) -> Vec<ChangeEvent> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match change_event_from_row(row) {
            Ok(ev) => out.push(ev),
            Err(e) => {
                tracing::warn!(target: "index", error = %e, "skipping changelog row");
                counter!("herald_malformed_events_total").increment(1);
            }
        }
    }
    out
}

fn optional_str(m: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    m.get(key).and_then(Value::as_str).map(str::to_string)
}

fn metadata_from_struct(m: &BTreeMap<String, Value>) -> PackageMetadata {
    let classifiers = match m.get("classifiers") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Default::default(),
    };
    PackageMetadata {
        classifiers,
        summary: optional_str(m, "summary"),
        home_page: optional_str(m, "home_page"),
    }
}

fn names_from_browse(v: Value) -> Result<Vec<String>> {
    let Value::Array(hits) = v else {
        return Err(Error::Decode(format!("browse: expected array, got {v:?}")));
    };
    Ok(hits
        .iter()
        .filter_map(|hit| match hit {
            Value::Array(pair) => pair.first().and_then(Value::as_str),
            _ => None,
        })
        .map(str::to_string)
        .collect())
}

// ------------------------------------------------------------
// Client
// ------------------------------------------------------------

#[derive(Clone)]
pub struct XmlRpcIndex {
    endpoint: String,
    client: reqwest::Client,
}

impl XmlRpcIndex {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        let body = encode_call(method, params);
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if status.is_server_error() {
            return Err(Error::TransientFetch(format!("{method}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::Decode(format!("{method}: HTTP {status}")));
        }
        parse_response(&text)
    }

    /// `system.multicall`: one round trip, one result (or fault) per call.
    pub async fn multicall(&self, calls: &[(&str, Vec<Value>)]) -> Result<Vec<Result<Value>>> {
        let batch = calls
            .iter()
            .map(|(method, params)| {
                let mut m = BTreeMap::new();
                m.insert("methodName".to_string(), Value::from(*method));
                m.insert("params".to_string(), Value::Array(params.clone()));
                Value::Struct(m)
            })
            .collect();

        let out = self.call("system.multicall", &[Value::Array(batch)]).await?;
        let Value::Array(items) = out else {
            return Err(Error::Decode(format!("multicall: expected array, got {out:?}")));
        };
        Ok(items
            .into_iter()
            .map(|item| match item {
                Value::Array(mut one) if one.len() == 1 => Ok(one.remove(0)),
                fault @ Value::Struct(_) => Err(fault_from(&fault)),
                other => Err(Error::Decode(format!("unexpected multicall entry {other:?}"))),
            })
            .collect())
    }
}

#[async_trait]
impl ReleaseSource for XmlRpcIndex {
    async fn release_data(&self, name: &str, version: &str) -> Result<Option<PackageMetadata>> {
        match self
            .call("release_data", &[Value::from(name), Value::from(version)])
            .await?
        {
            Value::Struct(m) if m.is_empty() => Ok(None),
            Value::Struct(m) => Ok(Some(metadata_from_struct(&m))),
            other => Err(Error::Decode(format!(
                "release_data: expected struct, got {other:?}"
            ))),
        }
    }

    async fn package_releases(&self, name: &str) -> Result<Vec<String>> {
        match self.call("package_releases", &[Value::from(name)]).await? {
            Value::Array(items) => Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()),
            other => Err(Error::Decode(format!(
                "package_releases: expected array, got {other:?}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "xmlrpc"
    }
}

#[async_trait]
impl PackageIndex for XmlRpcIndex {
    async fn changelog(&self, since: i64) -> Result<Vec<ChangeEvent>> {
        match self.call("changelog", &[Value::from(since)]).await? {
            Value::Array(rows) => Ok(events_from_rows(&rows)),
            other => Err(Error::Decode(format!(
                "changelog: expected array, got {other:?}"
            ))),
        }
    }

    async fn browse(&self, classifiers: &[String]) -> Result<Vec<String>> {
        let list = Value::Array(classifiers.iter().map(|c| Value::from(c.as_str())).collect());
        names_from_browse(self.call("browse", &[list]).await?)
    }

    async fn browse_each(&self, classifiers: &[String]) -> Result<Vec<Vec<String>>> {
        let calls: Vec<(&str, Vec<Value>)> = classifiers
            .iter()
            .map(|c| ("browse", vec![Value::Array(vec![Value::from(c.as_str())])]))
            .collect();
        self.multicall(&calls)
            .await?
            .into_iter()
            .map(|r| r.and_then(names_from_browse))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_call_with_escaped_strings() {
        let xml = encode_call("browse", &[Value::Array(vec!["A & B".into()])]);
        assert!(xml.contains("<methodName>browse</methodName>"));
        assert!(xml.contains("<value><array><data><value><string>A &amp; B</string></value></data></array></value>"));
    }

    #[test]
    fn parses_changelog_rows() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse><params><param><value><array><data>
  <value><array><data>
    <value><string>vimeo</string></value>
    <value><string>0.1.2</string></value>
    <value><int>1344087619</int></value>
    <value><string>update description, classifiers</string></value>
  </data></array></value>
  <value><array><data>
    <value><string>newpkg</string></value>
    <value><nil/></value>
    <value><i4>1344087620</i4></value>
    <value>create</value>
  </data></array></value>
</data></array></value></param></params></methodResponse>"#;
        let v = parse_response(xml).unwrap();
        let Value::Array(rows) = v else { panic!("not an array") };
        let evs = events_from_rows(&rows);
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[0].name, "vimeo");
        assert_eq!(evs[0].version.as_deref(), Some("0.1.2"));
        assert!(evs[0].is_update());
        assert_eq!(evs[1].version, None);
        assert_eq!(evs[1].timestamp, 1_344_087_620);
        assert!(evs[1].is_creation());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let rows = vec![
            Value::Array(vec!["ok".into(), "1.0".into(), Value::Int(1), "create".into()]),
            Value::Array(vec!["short".into()]),
            Value::Array(vec![Value::Int(3), "1.0".into(), Value::Int(1), "create".into()]),
            Value::Str("not a row".into()),
        ];
        let evs = events_from_rows(&rows);
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].name, "ok");
    }

    #[test]
    fn parses_struct_with_entities_and_empty_values() {
        let xml = r#"<methodResponse><params><param><value><struct>
<member><name>summary</name><value><string>Fast &amp; small</string></value></member>
<member><name>home_page</name><value/></member>
<member><name>classifiers</name><value><array><data>
  <value><string>Programming Language :: Python :: 3</string></value>
</data></array></value></member>
</struct></value></param></params></methodResponse>"#;
        let Value::Struct(m) = parse_response(xml).unwrap() else {
            panic!("not a struct")
        };
        let meta = metadata_from_struct(&m);
        assert_eq!(meta.summary.as_deref(), Some("Fast & small"));
        assert_eq!(meta.home_page(), None);
        assert!(meta.classifiers.contains("Programming Language :: Python :: 3"));
    }

    #[test]
    fn fault_response_becomes_error() {
        let xml = r#"<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>1</int></value></member>
<member><name>faultString</name><value><string>TypeError: cannot marshal None</string></value></member>
</struct></value></fault></methodResponse>"#;
        match parse_response(xml) {
            Err(Error::Fault { code, message }) => {
                assert_eq!(code, 1);
                assert!(message.contains("cannot marshal None"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn truncated_document_is_a_decode_error() {
        let xml = "<methodResponse><params><param><value><int>4</int>";
        assert!(matches!(parse_response(xml), Err(Error::Decode(_))));
    }
}
