use crate::client::Redis;
use crate::commands::cmd;
use redrest_core::{Arg, Command, CommandResult, RedisError};
use tracing::debug;

/// A Lua script bound to a client, addressed by the SHA1 of its source.
///
/// Read-only scripts (`Redis::create_script_ro`) run through `EVALSHA_RO` and
/// `EVAL_RO` in `exec`.
#[derive(Debug, Clone)]
pub struct Script {
    redis: Redis,
    source: String,
    sha1: String,
    read_only: bool,
}

impl Script {
    pub(crate) fn new(redis: Redis, source: String, read_only: bool) -> Self {
        let sha1 = sha1_smol::Sha1::from(source.as_bytes()).digest().to_string();
        Self {
            redis,
            source,
            sha1,
            read_only,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Hex SHA1 of the source, as used by `EVALSHA`.
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Sends the full source with `EVAL`.
    pub async fn eval<K, A>(&self, keys: K, args: A) -> CommandResult
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.redis
            .execute(cmd::eval(&self.source, keys, args))
            .await
    }

    /// Runs the cached script with `EVALSHA`; fails with `NOSCRIPT` if the
    /// server has not seen it.
    pub async fn evalsha<K, A>(&self, keys: K, args: A) -> CommandResult
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.redis
            .execute(cmd::evalsha(&self.sha1, keys, args))
            .await
    }

    pub async fn eval_ro<K, A>(&self, keys: K, args: A) -> CommandResult
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.redis
            .execute(cmd::eval_ro(&self.source, keys, args))
            .await
    }

    pub async fn evalsha_ro<K, A>(&self, keys: K, args: A) -> CommandResult
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.redis
            .execute(cmd::evalsha_ro(&self.sha1, keys, args))
            .await
    }

    /// Tries the cached script first and falls back to sending the source
    /// when the server answers `NOSCRIPT`.
    pub async fn exec<K, A>(&self, keys: K, args: A) -> CommandResult
    where
        K: IntoIterator,
        K::Item: Into<Arg>,
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        let keys: Vec<Arg> = keys.into_iter().map(Into::into).collect();
        let args: Vec<Arg> = args.into_iter().map(Into::into).collect();

        let (cached, full): (Command, Command) = if self.read_only {
            (
                cmd::evalsha_ro(&self.sha1, keys.clone(), args.clone()),
                cmd::eval_ro(&self.source, keys, args),
            )
        } else {
            (
                cmd::evalsha(&self.sha1, keys.clone(), args.clone()),
                cmd::eval(&self.source, keys, args),
            )
        };

        match self.redis.execute(cached).await {
            Err(RedisError::Command { message }) if is_noscript(&message) => {
                debug!(sha1 = %self.sha1, read_only = self.read_only, "script not cached, sending source");
                self.redis.execute(full).await
            }
            other => other,
        }
    }
}

fn is_noscript(message: &str) -> bool {
    message.to_ascii_lowercase().contains("noscript")
}
