//! Typed wrappers over [`Redis::execute`].
//!
//! Each wrapper only shapes arguments into a command (see [`cmd`]) and,
//! for a few replies, reshapes the result. Like `execute`, wrappers enqueue
//! at call time and return a future for the outcome.

use crate::client::Redis;
use futures::future::{BoxFuture, FutureExt};
use redrest_core::{Arg, CommandResult};
use serde_json::{Map, Value};

/// Expiry for [`Redis::set_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// `EX seconds`
    Seconds(i64),
    /// `PX milliseconds`
    Millis(i64),
}

/// Write condition for [`Redis::set_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// `NX`: only set if the key does not exist
    IfAbsent,
    /// `XX`: only set if the key already exists
    IfExists,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiry: Option<Expiry>,
    pub condition: Option<SetCondition>,
}

impl SetOptions {
    pub fn expire_in(mut self, expiry: Expiry) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn only(mut self, condition: SetCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Command builders, usable with [`Redis::execute`] and [`crate::Pipeline::push`].
pub mod cmd {
    use super::{Expiry, SetCondition, SetOptions};
    use redrest_core::{Arg, Command};

    pub fn ping() -> Command {
        Command::new("ping")
    }

    pub fn echo(message: impl Into<Arg>) -> Command {
        Command::new("echo").arg(message)
    }

    pub fn get(key: impl Into<Arg>) -> Command {
        Command::new("get").arg(key)
    }

    pub fn set(key: impl Into<Arg>, value: impl Into<Arg>) -> Command {
        Command::new("set").arg(key).arg(value)
    }

    pub fn set_with(key: impl Into<Arg>, value: impl Into<Arg>, options: SetOptions) -> Command {
        let mut command = set(key, value);
        match options.expiry {
            Some(Expiry::Seconds(seconds)) => command = command.arg("ex").arg(seconds),
            Some(Expiry::Millis(millis)) => command = command.arg("px").arg(millis),
            None => {}
        }
        match options.condition {
            Some(SetCondition::IfAbsent) => command = command.arg("nx"),
            Some(SetCondition::IfExists) => command = command.arg("xx"),
            None => {}
        }
        command
    }

    pub fn del<I>(keys: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::new("del").args(keys)
    }

    pub fn exists<I>(keys: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::new("exists").args(keys)
    }

    pub fn incr(key: impl Into<Arg>) -> Command {
        Command::new("incr").arg(key)
    }

    pub fn incrby(key: impl Into<Arg>, increment: i64) -> Command {
        Command::new("incrby").arg(key).arg(increment)
    }

    pub fn decr(key: impl Into<Arg>) -> Command {
        Command::new("decr").arg(key)
    }

    pub fn expire(key: impl Into<Arg>, seconds: i64) -> Command {
        Command::new("expire").arg(key).arg(seconds)
    }

    pub fn ttl(key: impl Into<Arg>) -> Command {
        Command::new("ttl").arg(key)
    }

    pub fn mget<I>(keys: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::new("mget").args(keys)
    }

    pub fn mset<I, K, V>(pairs: I) -> Command
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arg>,
        V: Into<Arg>,
    {
        pairs
            .into_iter()
            .fold(Command::new("mset"), |command, (key, value)| {
                command.arg(key).arg(value)
            })
    }

    pub fn hset<I, F, V>(key: impl Into<Arg>, fields: I) -> Command
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Arg>,
        V: Into<Arg>,
    {
        fields
            .into_iter()
            .fold(Command::new("hset").arg(key), |command, (field, value)| {
                command.arg(field).arg(value)
            })
    }

    pub fn hget(key: impl Into<Arg>, field: impl Into<Arg>) -> Command {
        Command::new("hget").arg(key).arg(field)
    }

    pub fn hgetall(key: impl Into<Arg>) -> Command {
        Command::new("hgetall").arg(key)
    }

    pub fn lpush<I>(key: impl Into<Arg>, elements: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::new("lpush").arg(key).args(elements)
    }

    pub fn lrange(key: impl Into<Arg>, start: i64, stop: i64) -> Command {
        Command::new("lrange").arg(key).arg(start).arg(stop)
    }

    pub fn sadd<I>(key: impl Into<Arg>, members: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::new("sadd").arg(key).args(members)
    }

    pub fn smembers(key: impl Into<Arg>) -> Command {
        Command::new("smembers").arg(key)
    }

    pub fn zadd(key: impl Into<Arg>, score: f64, member: impl Into<Arg>) -> Command {
        Command::new("zadd").arg(key).arg(score).arg(member)
    }

    pub fn zrange(key: impl Into<Arg>, start: i64, stop: i64, with_scores: bool) -> Command {
        let command = Command::new("zrange").arg(key).arg(start).arg(stop);
        if with_scores {
            command.arg("withscores")
        } else {
            command
        }
    }

    /// `SCAN cursor [MATCH pattern] [COUNT count]`
    pub fn scan(cursor: impl Into<Arg>, pattern: Option<&str>, count: Option<i64>) -> Command {
        let mut command = Command::new("scan").arg(cursor);
        if let Some(pattern) = pattern {
            command = command.arg("match").arg(pattern);
        }
        if let Some(count) = count {
            command = command.arg("count").arg(count);
        }
        command
    }

    pub fn eval<K, A>(script: &str, keys: K, args: A) -> Command
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        with_keys_and_args(Command::new("eval").arg(script), keys, args)
    }

    pub fn evalsha<K, A>(sha1: &str, keys: K, args: A) -> Command
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        with_keys_and_args(Command::new("evalsha").arg(sha1), keys, args)
    }

    /// Read-only `EVAL`, safe to route to replicas.
    pub fn eval_ro<K, A>(script: &str, keys: K, args: A) -> Command
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        with_keys_and_args(Command::new("eval_ro").arg(script), keys, args)
    }

    pub fn evalsha_ro<K, A>(sha1: &str, keys: K, args: A) -> Command
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        with_keys_and_args(Command::new("evalsha_ro").arg(sha1), keys, args)
    }

    pub fn flushdb() -> Command {
        Command::new("flushdb")
    }

    fn with_keys_and_args<K, A>(command: Command, keys: K, args: A) -> Command
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        let keys: Vec<Arg> = keys.into_iter().map(Into::into).collect();
        command
            .arg(keys.len() as i64)
            .args(keys)
            .args(args)
    }
}

/// Turns the flat `[field, value, ...]` reply into an object; an empty hash is `null`.
fn pairs_to_object(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };
    if items.is_empty() {
        return Value::Null;
    }

    let mut object = Map::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        let field = match field {
            Value::String(s) => s,
            other => other.to_string(),
        };
        object.insert(field, value);
    }
    Value::Object(object)
}

/// Cursors are opaque; a numeric cursor parsed by deserialization is turned back into text.
fn normalize_scan_reply(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 2 => {
            if let Value::Number(cursor) = &items[0] {
                items[0] = Value::String(cursor.to_string());
            }
            Value::Array(items)
        }
        other => other,
    }
}

impl Redis {
    pub fn ping(&self) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::ping())
    }

    pub fn echo(&self, message: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::echo(message))
    }

    pub fn get(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::get(key))
    }

    pub fn set(
        &self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::set(key, value))
    }

    pub fn set_with(
        &self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
        options: SetOptions,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::set_with(key, value, options))
    }

    pub fn del<I>(&self, keys: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.execute(cmd::del(keys))
    }

    pub fn exists<I>(&self, keys: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.execute(cmd::exists(keys))
    }

    pub fn incr(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::incr(key))
    }

    pub fn incrby(&self, key: impl Into<Arg>, increment: i64) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::incrby(key, increment))
    }

    pub fn decr(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::decr(key))
    }

    pub fn expire(&self, key: impl Into<Arg>, seconds: i64) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::expire(key, seconds))
    }

    pub fn ttl(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::ttl(key))
    }

    pub fn mget<I>(&self, keys: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.execute(cmd::mget(keys))
    }

    pub fn mset<I, K, V>(&self, pairs: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arg>,
        V: Into<Arg>,
    {
        self.execute(cmd::mset(pairs))
    }

    pub fn hset<I, F, V>(&self, key: impl Into<Arg>, fields: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Arg>,
        V: Into<Arg>,
    {
        self.execute(cmd::hset(key, fields))
    }

    pub fn hget(
        &self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::hget(key, field))
    }

    /// The hash as a JSON object, or `null` when the key does not exist.
    pub fn hgetall(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::hgetall(key))
            .map(|result| result.map(pairs_to_object))
            .boxed()
    }

    pub fn lpush<I>(&self, key: impl Into<Arg>, elements: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.execute(cmd::lpush(key, elements))
    }

    pub fn lrange(
        &self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::lrange(key, start, stop))
    }

    pub fn sadd<I>(&self, key: impl Into<Arg>, members: I) -> BoxFuture<'static, CommandResult>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.execute(cmd::sadd(key, members))
    }

    pub fn smembers(&self, key: impl Into<Arg>) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::smembers(key))
    }

    pub fn zadd(
        &self,
        key: impl Into<Arg>,
        score: f64,
        member: impl Into<Arg>,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::zadd(key, score, member))
    }

    pub fn zrange(
        &self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
        with_scores: bool,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::zrange(key, start, stop, with_scores))
    }

    /// Returns `[cursor, keys]` with the cursor always a string.
    pub fn scan(
        &self,
        cursor: impl Into<Arg>,
        pattern: Option<&str>,
        count: Option<i64>,
    ) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::scan(cursor, pattern, count))
            .map(|result| result.map(normalize_scan_reply))
            .boxed()
    }

    pub fn eval<K, A>(&self, script: &str, keys: K, args: A) -> BoxFuture<'static, CommandResult>
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.execute(cmd::eval(script, keys, args))
    }

    pub fn evalsha<K, A>(&self, sha1: &str, keys: K, args: A) -> BoxFuture<'static, CommandResult>
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.execute(cmd::evalsha(sha1, keys, args))
    }

    pub fn eval_ro<K, A>(
        &self,
        script: &str,
        keys: K,
        args: A,
    ) -> BoxFuture<'static, CommandResult>
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.execute(cmd::eval_ro(script, keys, args))
    }

    pub fn evalsha_ro<K, A>(
        &self,
        sha1: &str,
        keys: K,
        args: A,
    ) -> BoxFuture<'static, CommandResult>
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.execute(cmd::evalsha_ro(sha1, keys, args))
    }

    pub fn flushdb(&self) -> BoxFuture<'static, CommandResult> {
        self.execute(cmd::flushdb())
    }
}
