// In-process test doubles for the REST endpoint
// MemoryRedis answers a small Redis subset and counts every request it sees

#![allow(dead_code)]

use async_trait::async_trait;
use redrest_client::{
    Arg, ClientConfig, Command, Redis, Requester, RestRequest, RestResponse, RetryPolicy,
    TransportError,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    strings: BTreeMap<String, String>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    scripts: HashMap<String, String>,
}

/// Minimal Redis over the `/pipeline` and `/multi-exec` endpoints.
#[derive(Default)]
pub struct MemoryRedis {
    state: Mutex<State>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RestRequest>>,
}

impl MemoryRedis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Commands of every request, as sent on the wire.
    pub fn batches(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|r| serde_json::to_value(r.body()).unwrap())
            .collect()
    }

    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().strings.get(key).cloned()
    }

    pub fn raw_set(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .strings
            .insert(key.to_string(), value.to_string());
    }

    fn apply(state: &mut State, command: &Command) -> Result<Value, String> {
        let args: Vec<String> = command.as_args().iter().map(Arg::to_string).collect();
        let verb = args.first().map(|v| v.to_uppercase()).unwrap_or_default();
        let rest = &args[1.min(args.len())..];

        let arity = |n: usize| {
            if rest.len() < n {
                Err(format!(
                    "ERR wrong number of arguments for '{}' command",
                    verb.to_lowercase()
                ))
            } else {
                Ok(())
            }
        };

        match verb.as_str() {
            "PING" => Ok(rest.first().map_or(json!("PONG"), |m| json!(m))),
            "ECHO" => {
                arity(1)?;
                Ok(json!(rest[0]))
            }
            "SET" => {
                arity(2)?;
                let flags: Vec<String> = rest[2..].iter().map(|f| f.to_uppercase()).collect();
                let exists = state.strings.contains_key(&rest[0]);
                if (flags.contains(&"NX".to_string()) && exists)
                    || (flags.contains(&"XX".to_string()) && !exists)
                {
                    return Ok(Value::Null);
                }
                state.strings.insert(rest[0].clone(), rest[1].clone());
                Ok(json!("OK"))
            }
            "GET" => {
                arity(1)?;
                Ok(state.strings.get(&rest[0]).map_or(Value::Null, |v| json!(v)))
            }
            "DEL" => Ok(json!(rest
                .iter()
                .filter(|k| state.strings.remove(*k).is_some() | state.hashes.remove(*k).is_some())
                .count())),
            "EXISTS" => Ok(json!(rest
                .iter()
                .filter(|k| state.strings.contains_key(*k) || state.hashes.contains_key(*k))
                .count())),
            "INCR" | "DECR" | "INCRBY" => {
                arity(if verb == "INCRBY" { 2 } else { 1 })?;
                let delta = match verb.as_str() {
                    "INCR" => 1,
                    "DECR" => -1,
                    _ => rest[1].parse::<i64>().map_err(|_| not_an_integer())?,
                };
                let current = match state.strings.get(&rest[0]) {
                    Some(v) => v.parse::<i64>().map_err(|_| not_an_integer())?,
                    None => 0,
                };
                let next = current + delta;
                state.strings.insert(rest[0].clone(), next.to_string());
                Ok(json!(next))
            }
            "MGET" => Ok(Value::Array(
                rest.iter()
                    .map(|k| state.strings.get(k).map_or(Value::Null, |v| json!(v)))
                    .collect(),
            )),
            "MSET" => {
                for pair in rest.chunks(2) {
                    if let [key, value] = pair {
                        state.strings.insert(key.clone(), value.clone());
                    }
                }
                Ok(json!("OK"))
            }
            "HSET" => {
                arity(3)?;
                let hash = state.hashes.entry(rest[0].clone()).or_default();
                let added = rest[1..]
                    .chunks(2)
                    .filter_map(|pair| match pair {
                        [field, value] => hash.insert(field.clone(), value.clone()).is_none().then_some(()),
                        _ => None,
                    })
                    .count();
                Ok(json!(added))
            }
            "HGET" => {
                arity(2)?;
                Ok(state
                    .hashes
                    .get(&rest[0])
                    .and_then(|h| h.get(&rest[1]))
                    .map_or(Value::Null, |v| json!(v)))
            }
            "HGETALL" => {
                arity(1)?;
                let flat = state
                    .hashes
                    .get(&rest[0])
                    .map(|h| {
                        h.iter()
                            .flat_map(|(f, v)| [json!(f), json!(v)])
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Ok(Value::Array(flat))
            }
            "SCAN" => {
                arity(1)?;
                let keys: Vec<Value> = state.strings.keys().map(|k| json!(k)).collect();
                Ok(json!(["0", keys]))
            }
            // Scripts echo back their keys followed by their arguments.
            "EVAL" | "EVAL_RO" => {
                arity(2)?;
                let sha1 = sha1_smol::Sha1::from(rest[0].as_bytes()).digest().to_string();
                state.scripts.insert(sha1, rest[0].clone());
                Ok(json!(rest[2..]))
            }
            "EVALSHA" | "EVALSHA_RO" => {
                arity(2)?;
                if !state.scripts.contains_key(&rest[0]) {
                    return Err("NOSCRIPT No matching script. Please use EVAL.".to_string());
                }
                Ok(json!(rest[2..]))
            }
            "FLUSHDB" => {
                *state = State::default();
                Ok(json!("OK"))
            }
            _ => Err(unknown_command(&args)),
        }
    }

    fn is_known(command: &Command) -> bool {
        const KNOWN: &[&str] = &[
            "PING", "ECHO", "SET", "GET", "DEL", "EXISTS", "INCR", "DECR", "INCRBY", "MGET",
            "MSET", "HSET", "HGET", "HGETALL", "SCAN", "EVAL", "EVALSHA", "EVAL_RO", "EVALSHA_RO",
            "FLUSHDB",
        ];
        KNOWN.iter().any(|k| k.eq_ignore_ascii_case(command.name()))
    }
}

fn not_an_integer() -> String {
    "ERR value is not an integer or out of range".to_string()
}

fn unknown_command(args: &[String]) -> String {
    format!(
        "ERR unknown command '{}'",
        args.first().map(String::as_str).unwrap_or("")
    )
}

fn outcome(result: Result<Value, String>) -> Value {
    match result {
        Ok(value) => json!({ "result": value }),
        Err(error) => json!({ "error": error }),
    }
}

#[async_trait]
impl Requester for MemoryRedis {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mut state = self.state.lock().unwrap();
        let commands = request.body().commands();

        match request.path.first().map(String::as_str) {
            Some("pipeline") => {
                let body = commands
                    .iter()
                    .map(|c| outcome(Self::apply(&mut state, c)))
                    .collect();
                Ok(RestResponse::ok(Value::Array(body)))
            }
            Some("multi-exec") => {
                // queued commands are checked before any of them run
                if let Some(bad) = commands.iter().find(|c| !Self::is_known(c)) {
                    let args: Vec<String> = bad.as_args().iter().map(Arg::to_string).collect();
                    return Ok(RestResponse::new(
                        400,
                        json!({ "error": format!("EXECABORT {}", unknown_command(&args)) }),
                    ));
                }
                let body = commands
                    .iter()
                    .map(|c| outcome(Self::apply(&mut state, c)))
                    .collect();
                Ok(RestResponse::ok(Value::Array(body)))
            }
            other => Ok(RestResponse::new(
                404,
                json!({ "error": format!("unknown endpoint {:?}", other) }),
            )),
        }
    }
}

/// Fails the first `failures` requests, then forwards to the inner requester.
pub struct Flaky {
    inner: Arc<MemoryRedis>,
    failures: AtomicUsize,
    attempts: AtomicUsize,
    failure: Failure,
}

#[derive(Clone)]
pub enum Failure {
    Error(TransportError),
    /// An `Ok` response carrying this status
    Status(u16),
}

impl Flaky {
    pub fn new(inner: Arc<MemoryRedis>, failures: usize, failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            failure,
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Requester for Flaky {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !should_fail {
            return self.inner.send(request).await;
        }
        match &self.failure {
            Failure::Error(err) => Err(err.clone()),
            Failure::Status(status) => Ok(RestResponse::new(
                *status,
                json!({ "error": "service unavailable" }),
            )),
        }
    }
}

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("http://localhost:8079", "test-token");
    config.retry = RetryPolicy::new(3, |_| Duration::ZERO);
    config
}

pub fn client_with(requester: Arc<dyn Requester>, config: ClientConfig) -> Redis {
    redrest_client::logging::init_test_logging();
    Redis::builder(config).requester_arc(requester).build().unwrap()
}

pub fn client(memory: &Arc<MemoryRedis>) -> Redis {
    client_with(memory.clone(), test_config())
}
