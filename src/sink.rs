use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::info;

use crate::config::InfluxConfig;
use crate::logging::Logger;
use crate::util::now_ns;

/// A single field value of a sink point.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Str(String),
}

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

/// ============================================================
/// MetricsSink
/// ============================================================
///
/// Time-series store accepting one point at a time.
///
/// CONTRACT:
/// - A write either stores the whole point or fails
/// - No buffering or retries; callers decide what to do on failure
///
/// THREAD SAFETY:
/// - Shared behind `Arc` by every collector cycle
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_raw(&self, measurement: &str, tags: &Tags, fields: &Fields) -> Result<()>;
}

// ------------------------------------------------------------
// Line protocol
// ------------------------------------------------------------

fn escape_measurement(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, ',' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn escape_key(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Encodes one point in InfluxDB line protocol.
///
/// Tags and fields are emitted in key order, which is also the order
/// InfluxDB prefers for tags.
pub fn encode_line(measurement: &str, tags: &Tags, fields: &Fields, ts_ns: i64) -> Result<String> {
    if fields.is_empty() {
        bail!("point for {measurement} has no fields");
    }

    let mut line = String::with_capacity(128);
    escape_measurement(&mut line, measurement);

    for (k, v) in tags {
        line.push(',');
        escape_key(&mut line, k);
        line.push('=');
        escape_key(&mut line, v);
    }

    line.push(' ');
    for (i, (k, v)) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        escape_key(&mut line, k);
        line.push('=');
        match v {
            FieldValue::Float(f) => {
                if !f.is_finite() {
                    bail!("field {k} is not a finite number");
                }
                let _ = write!(line, "{f}");
            }
            FieldValue::Int(n) => {
                let _ = write!(line, "{n}i");
            }
            FieldValue::Str(s) => {
                line.push('"');
                for c in s.chars() {
                    if matches!(c, '"' | '\\') {
                        line.push('\\');
                    }
                    line.push(c);
                }
                line.push('"');
            }
        }
    }

    let _ = write!(line, " {ts_ns}");
    Ok(line)
}

/// ============================================================
/// InfluxSink
/// ============================================================
///
/// Writes points through the InfluxDB 1.x HTTP API (`/write`).
///
/// DEMO MODE:
/// - No network connections
/// - Points are logged at info level instead
pub struct InfluxSink {
    http: reqwest::Client,
    write_url: reqwest::Url,
    demo: bool,
    log: Logger,
}

impl InfluxSink {
    pub fn new(http: reqwest::Client, cfg: &InfluxConfig, log: Logger) -> Result<Self> {
        let mut params = vec![("db", cfg.database.as_str()), ("precision", "ns")];
        if let Some(user) = &cfg.username {
            params.push(("u", user.as_str()));
        }
        if let Some(pass) = &cfg.password {
            params.push(("p", pass.as_str()));
        }

        let base = cfg.url.trim_end_matches('/');
        let write_url = reqwest::Url::parse_with_params(&format!("{base}/write"), &params)
            .with_context(|| format!("invalid influx url {}", cfg.url))?;

        let demo = cfg.demo.unwrap_or(false);
        if demo {
            info!(target: log.target(), "influx sink running in DEMO mode");
        }

        Ok(Self {
            http,
            write_url,
            demo,
            log,
        })
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    async fn write_raw(&self, measurement: &str, tags: &Tags, fields: &Fields) -> Result<()> {
        let line = encode_line(measurement, tags, fields, now_ns())?;

        if self.demo {
            info!(target: self.log.target(), "DEMO -> {line}");
            return Ok(());
        }

        let resp = self
            .http
            .post(self.write_url.clone())
            .body(line)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("influx write returned {status}: {body}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn point() -> (Tags, Fields) {
        let tags = Tags::from([("addr".to_string(), "0xabc".to_string())]);
        let fields = Fields::from([
            ("balance".to_string(), FieldValue::Float(2.5)),
            ("deals".to_string(), FieldValue::Int(3)),
            ("orders".to_string(), FieldValue::Int(7)),
        ]);
        (tags, fields)
    }

    fn influx_cfg(url: String) -> InfluxConfig {
        InfluxConfig {
            url,
            database: "monitoring".into(),
            username: Some("collector".into()),
            password: Some("secret".into()),
            demo: None,
        }
    }

    #[test]
    fn encodes_wallet_point() {
        let (tags, fields) = point();
        let line = encode_line("wallets", &tags, &fields, 42).unwrap();
        assert_eq!(line, "wallets,addr=0xabc balance=2.5,deals=3i,orders=7i 42");
    }

    #[test]
    fn escapes_special_characters() {
        let tags = Tags::from([("host name".to_string(), "a,b=c".to_string())]);
        let fields = Fields::from([("note".to_string(), FieldValue::Str("say \"hi\"".into()))]);
        let line = encode_line("my measure", &tags, &fields, 1).unwrap();
        assert_eq!(line, r#"my\ measure,host\ name=a\,b\=c note="say \"hi\"" 1"#);
    }

    #[test]
    fn whole_floats_stay_floats() {
        let fields = Fields::from([("balance".to_string(), FieldValue::Float(3.0))]);
        let line = encode_line("wallets", &Tags::new(), &fields, 1).unwrap();
        assert_eq!(line, "wallets balance=3 1");
    }

    #[test]
    fn rejects_empty_and_non_finite_fields() {
        assert!(encode_line("wallets", &Tags::new(), &Fields::new(), 1).is_err());
        let nan = Fields::from([("balance".to_string(), FieldValue::Float(f64::NAN))]);
        assert!(encode_line("wallets", &Tags::new(), &nan, 1).is_err());
    }

    #[tokio::test]
    async fn posts_line_to_write_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "monitoring"))
            .and(query_param("precision", "ns"))
            .and(query_param("u", "collector"))
            .and(query_param("p", "secret"))
            .and(body_string_contains("wallets,addr=0xabc balance=2.5,deals=3i,orders=7i "))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = InfluxSink::new(
            reqwest::Client::new(),
            &influx_cfg(server.uri()),
            Logger::root("test"),
        )
        .unwrap();
        let (tags, fields) = point();
        sink.write_raw("wallets", &tags, &fields).await.unwrap();
    }

    #[tokio::test]
    async fn write_errors_carry_the_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("database not found"))
            .mount(&server)
            .await;

        let sink = InfluxSink::new(
            reqwest::Client::new(),
            &influx_cfg(server.uri()),
            Logger::root("test"),
        )
        .unwrap();
        let (tags, fields) = point();
        let err = sink.write_raw("wallets", &tags, &fields).await.unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }

    #[tokio::test]
    async fn demo_mode_never_touches_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = influx_cfg(server.uri());
        cfg.demo = Some(true);
        let sink = InfluxSink::new(reqwest::Client::new(), &cfg, Logger::root("test")).unwrap();
        let (tags, fields) = point();
        sink.write_raw("wallets", &tags, &fields).await.unwrap();
    }
}
