use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use chkr_core::{
    ConcurrencyProfile, EndpointSpec, Expectation, ExpectedValue, Method, RetryPolicy,
    ValueCheck,
};
use serde::Deserialize;

/// Variables available to `${NAME}` substitution.
pub(crate) type EnvVars = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ConfigYaml {
    #[serde(default)]
    pub endpoints: Vec<EndpointYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointYaml {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,

    /// Kept in document order.
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: Vec<(String, String)>,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub expect: ExpectYaml,
    #[serde(default)]
    pub retry: RetryYaml,
    #[serde(default)]
    pub concurrent: ConcurrentYaml,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExpectYaml {
    pub status: Option<u16>,
    pub max_time: Option<YamlDuration>,
    #[serde(default)]
    pub values: Vec<ValueCheckYaml>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValueCheckYaml {
    pub path: String,
    #[serde(default)]
    pub value: serde_yaml::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RetryYaml {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub delay: YamlDuration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ConcurrentYaml {
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub delay: YamlDuration,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 250ms), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v)
                    .map_err(|_| E::custom("duration must not be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a finite, non-negative number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = Option::<serde_yaml::Mapping>::deserialize(deserializer)?.unwrap_or_default();
    let mut out = Vec::with_capacity(raw.len());

    for (k, v) in raw {
        let name = scalar_to_string(k)
            .ok_or_else(|| D::Error::custom("header names must be scalars"))?;
        let Some(value) = scalar_to_string(v) else {
            return Err(D::Error::custom(format!(
                "header `{name}` must have a scalar value"
            )));
        };
        out.push((name, value));
    }

    Ok(out)
}

fn scalar_to_string(v: serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s),
        _ => None,
    }
}

fn expected_value(v: serde_yaml::Value) -> anyhow::Result<ExpectedValue> {
    Ok(match v {
        serde_yaml::Value::Null => ExpectedValue::Null,
        serde_yaml::Value::Bool(b) => ExpectedValue::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ExpectedValue::from(i)
            } else if let Some(u) = n.as_u64() {
                ExpectedValue::from(u)
            } else if let Some(f) = n.as_f64() {
                ExpectedValue::Number(f)
            } else {
                ExpectedValue::String(n.to_string())
            }
        }
        serde_yaml::Value::String(s) => ExpectedValue::String(s),
        serde_yaml::Value::Tagged(t) => expected_value(t.value)?,
        nested @ (serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_)) => {
            let json = serde_json::to_value(&nested).context("value is not representable as JSON")?;
            ExpectedValue::String(json.to_string())
        }
    })
}

/// Replaces every `${NAME}` with its value from `env`.
pub(crate) fn substitute(input: &str, env: &EnvVars) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("unterminated `${{` in `{input}`"))?;
        let name = &after[..end];
        if name.is_empty() {
            anyhow::bail!("empty variable name in `{input}`");
        }
        let value = env
            .get(name)
            .with_context(|| format!("environment variable `{name}` is not set"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

impl EndpointYaml {
    fn into_spec(self, idx: usize, env: &EnvVars) -> anyhow::Result<EndpointSpec> {
        let name = if self.name.trim().is_empty() {
            format!("endpoint-{}", idx + 1)
        } else {
            self.name
        };

        if self.url.trim().is_empty() {
            anyhow::bail!("endpoint `{name}`: missing URL");
        }
        if self.method.trim().is_empty() {
            anyhow::bail!("endpoint `{name}`: missing method");
        }
        if self.concurrent.users > 0 && self.concurrent.total == 0 {
            anyhow::bail!(
                "endpoint `{name}`: concurrent users set but total requests not specified"
            );
        }

        let method = Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .with_context(|| format!("endpoint `{name}`: invalid method `{}`", self.method))?;
        let url = substitute(self.url.trim(), env)
            .with_context(|| format!("endpoint `{name}`: url"))?;

        let headers = self
            .headers
            .into_iter()
            .map(|(k, v)| {
                let v = substitute(&v, env)
                    .with_context(|| format!("endpoint `{name}`: header `{k}`"))?;
                Ok((k, v))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let body = substitute(&self.body, env).with_context(|| format!("endpoint `{name}`: body"))?;

        let values = self
            .expect
            .values
            .into_iter()
            .map(|c| {
                let expected = expected_value(c.value)
                    .with_context(|| format!("endpoint `{name}`: value for path `{}`", c.path))?;
                Ok(ValueCheck {
                    path: c.path,
                    expected,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let spec = EndpointSpec {
            name,
            url,
            method,
            headers,
            body: body.into(),
            expect: Expectation {
                status: self.expect.status.unwrap_or(200),
                max_duration: self
                    .expect
                    .max_time
                    .map(YamlDuration::into_inner)
                    .filter(|d| !d.is_zero()),
                values,
            },
            retry: RetryPolicy {
                count: self.retry.count,
                delay: self.retry.delay.into_inner(),
            },
            concurrency: ConcurrencyProfile {
                users: self.concurrent.users,
                delay: self.concurrent.delay.into_inner(),
                total: self.concurrent.total,
            },
        };

        spec.validate()
            .with_context(|| format!("endpoint `{}`", spec.name))?;
        Ok(spec)
    }
}

pub(crate) fn parse_endpoints(yaml: &str, env: &EnvVars) -> anyhow::Result<Vec<EndpointSpec>> {
    let doc: ConfigYaml = serde_yaml::from_str(yaml).context("failed to parse YAML")?;

    if doc.endpoints.is_empty() {
        anyhow::bail!("no endpoints defined");
    }

    doc.endpoints
        .into_iter()
        .enumerate()
        .map(|(idx, e)| e.into_spec(idx, env))
        .collect()
}

pub(crate) async fn load_endpoints(
    path: &Path,
    env: &EnvVars,
) -> anyhow::Result<Vec<EndpointSpec>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;

    parse_endpoints(&text, env).with_context(|| format!("invalid config: {}", path.display()))
}

/// Process environment with `KEY=VALUE` overrides applied on top.
pub(crate) fn merged_env(overrides: &[String]) -> anyhow::Result<EnvVars> {
    let mut map: EnvVars = std::env::vars().collect();
    for raw in overrides {
        let (k, v) = parse_env_override(raw)?;
        map.insert(k, v);
    }
    Ok(map)
}

fn parse_env_override(s: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = s
        .split_once('=')
        .with_context(|| format!("invalid --env (expected KEY=VALUE): {s}"))?;
    if k.is_empty() {
        anyhow::bail!("invalid --env (empty KEY): {s}");
    }
    Ok((k.to_string(), v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Vec<EndpointSpec> {
        parse_endpoints(yaml, &EnvVars::new()).unwrap_or_else(|e| panic!("{e:#}"))
    }

    fn parse_err(yaml: &str) -> String {
        match parse_endpoints(yaml, &EnvVars::new()) {
            Ok(specs) => panic!("expected an error, got {specs:?}"),
            Err(e) => format!("{e:#}"),
        }
    }

    #[test]
    fn parses_full_endpoint() {
        let specs = parse(
            r#"
endpoints:
  - name: get-post
    url: http://localhost:8080/posts/1
    method: get
    headers:
      X-B: second
      Accept: application/json
      X-Num: 7
    body: '{"a":1}'
    expect:
      status: 201
      maxTime: 500ms
      values:
        - path: title
          value: foo
        - path: id
          value: 1
        - path: ok
          value: true
        - path: author
          value: null
    retry:
      count: 2
      delay: 1s
    concurrent:
      users: 5
      delay: 0.25
      total: 50
"#,
        );

        assert_eq!(specs.len(), 1);
        let s = &specs[0];
        assert_eq!(s.name, "get-post");
        assert_eq!(s.method, Method::GET);
        assert_eq!(
            s.headers,
            vec![
                ("X-B".to_string(), "second".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Num".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(&s.body[..], br#"{"a":1}"#);
        assert_eq!(s.expect.status, 201);
        assert_eq!(s.expect.max_duration, Some(Duration::from_millis(500)));
        assert_eq!(
            s.expect.values,
            vec![
                ValueCheck::new("title", "foo"),
                ValueCheck::new("id", 1i64),
                ValueCheck::new("ok", true),
                ValueCheck::new("author", ExpectedValue::Null),
            ]
        );
        assert_eq!(s.retry.count, 2);
        assert_eq!(s.retry.delay, Duration::from_secs(1));
        assert_eq!(s.concurrency.users, 5);
        assert_eq!(s.concurrency.total, 50);
        assert_eq!(s.concurrency.delay, Duration::from_millis(250));
    }

    #[test]
    fn defaults_are_filled_in() {
        let specs = parse(
            r#"
endpoints:
  - url: http://localhost/
    method: POST
"#,
        );
        let s = &specs[0];
        assert_eq!(s.name, "endpoint-1");
        assert_eq!(s.method, Method::POST);
        assert_eq!(s.expect, Expectation::default());
        assert_eq!(s.retry, RetryPolicy::default());
        assert!(!s.concurrency.is_concurrent());
        assert!(s.body.is_empty());
    }

    #[test]
    fn nested_values_compare_as_compact_json() {
        let specs = parse(
            r#"
endpoints:
  - url: http://localhost/
    method: GET
    expect:
      values:
        - path: tags
          value: [a, b]
"#,
        );
        assert_eq!(
            specs[0].expect.values[0].expected,
            ExpectedValue::String(r#"["a","b"]"#.to_string())
        );
    }

    #[test]
    fn large_integers_are_kept_exact() {
        let specs = parse(
            r#"
endpoints:
  - url: http://localhost/
    method: GET
    expect:
      values:
        - path: id
          value: 9007199254740993
        - path: big
          value: 18446744073709551615
"#,
        );
        let values = &specs[0].expect.values;
        assert_eq!(values[0].expected, ExpectedValue::Integer(9_007_199_254_740_993));
        assert_eq!(values[1].expected, ExpectedValue::Integer(u64::MAX.into()));
        assert!(values[0].expected.matches(&serde_json::json!(9_007_199_254_740_993i64)));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(parse_err("endpoints: []").contains("no endpoints defined"));
        assert!(parse_err("{}").contains("no endpoints defined"));
    }

    #[test]
    fn rejects_missing_url_and_method() {
        let err = parse_err("endpoints: [{ name: a, method: GET }]");
        assert!(err.contains("endpoint `a`: missing URL"), "{err}");

        let err = parse_err("endpoints: [{ name: b, url: http://x/ }]");
        assert!(err.contains("endpoint `b`: missing method"), "{err}");
    }

    #[test]
    fn rejects_users_without_total() {
        let err = parse_err(
            "endpoints: [{ name: c, url: http://x/, method: GET, concurrent: { users: 3 } }]",
        );
        assert!(err.contains("total requests not specified"), "{err}");
    }

    #[test]
    fn rejects_more_users_than_requests() {
        let err = parse_err(
            "endpoints: [{ name: d, url: http://x/, method: GET, concurrent: { users: 3, total: 2 } }]",
        );
        assert!(err.contains("endpoint `d`"), "{err}");
        assert!(err.contains("cannot share"), "{err}");
    }

    #[test]
    fn rejects_bad_durations() {
        let err = parse_err(
            "endpoints: [{ url: http://x/, method: GET, retry: { count: 1, delay: soon } }]",
        );
        assert!(err.contains("failed to parse YAML"), "{err}");
    }

    #[test]
    fn substitutes_env_vars() {
        let env: EnvVars = [("BASE".to_string(), "http://h:1".to_string())].into();
        assert_eq!(
            substitute("${BASE}/a/${BASE}", &env).unwrap_or_else(|e| panic!("{e:#}")),
            "http://h:1/a/http://h:1"
        );
        assert_eq!(
            substitute("no vars", &env).unwrap_or_else(|e| panic!("{e:#}")),
            "no vars"
        );
        assert!(substitute("${MISSING}", &env).is_err());
        assert!(substitute("${BASE", &env).is_err());
        assert!(substitute("${}", &env).is_err());
    }

    #[test]
    fn url_uses_env() {
        let env: EnvVars = [("BASE_URL".to_string(), "http://127.0.0.1:9".to_string())].into();
        let specs = parse_endpoints(
            "endpoints: [{ url: '${BASE_URL}/hello', method: GET, headers: { X-Env: '${BASE_URL}' } }]",
            &env,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(specs[0].url, "http://127.0.0.1:9/hello");
        assert_eq!(specs[0].headers[0].1, "http://127.0.0.1:9");
    }

    #[test]
    fn env_override_parsing() {
        assert!(parse_env_override("A=1").is_ok());
        assert!(parse_env_override("A=").is_ok());
        assert!(parse_env_override("=1").is_err());
        assert!(parse_env_override("A").is_err());
    }
}
