//! Command methods.
//!
//! Every command is declared once in the table below and expands into a
//! default method on [`RedisCommands`]. What a method returns depends on
//! the [`CommandSet`] it is called on:
//!
//! | receiver                         | `Output<T>`           |
//! |----------------------------------|-----------------------|
//! | `RespConnection`, `MockClient`   | `PendingReply<T>`     |
//! | `SyncCommands<C>`                | `BridgeResult<T>`     |
//! | `SelectedNodes`                  | `Executions<T>`       |
//!
//! ```ignore
//! let value: Option<Bytes> = sync.get("key")?;
//! let per_node = cluster.primaries().dbsize();
//! ```

use crate::protocol::{Command, FromRedisValue, RedisValue, ToRedisArgs};
use bytes::Bytes;
use std::collections::HashMap;

/// A receiver of commands.
pub trait CommandSet {
    /// What a command invocation produces.
    type Output<T: FromRedisValue + Send + 'static>;

    /// Send `command` and shape its reply as `T`.
    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> Self::Output<T>;
}

macro_rules! redis_commands {
    ($(
        $(#[$meta:meta])*
        fn $method:ident $(< $($gen:ident : $bound:ident),+ >)? ( $($arg:ident : $argty:ty),* ) -> $ret:ty $body:block
    )*) => {
        /// Typed methods for every supported command.
        pub trait RedisCommands: CommandSet {
            $(
                $(#[$meta])*
                fn $method $(< $($gen: $bound),+ >)? (&self, $($arg: $argty),*) -> Self::Output<$ret> {
                    self.invoke::<$ret>($body)
                }
            )*
        }
    };
}

redis_commands! {
    // Connection

    /// PING
    fn ping() -> String { Command::new("PING") }

    /// ECHO message
    fn echo<M: ToRedisArgs>(message: M) -> String { Command::new("ECHO").arg(message) }

    /// CLIENT ID
    fn client_id() -> i64 { Command::new("CLIENT").arg("ID") }

    // Keys

    /// DEL key [key ...]
    fn del<K: ToRedisArgs>(keys: K) -> i64 { Command::new("DEL").arg(keys) }

    /// EXISTS key [key ...]
    fn exists<K: ToRedisArgs>(keys: K) -> i64 { Command::new("EXISTS").arg(keys) }

    /// EXPIRE key seconds
    fn expire<K: ToRedisArgs>(key: K, seconds: u64) -> bool {
        Command::new("EXPIRE").arg(key).arg(seconds)
    }

    /// PEXPIRE key milliseconds
    fn pexpire<K: ToRedisArgs>(key: K, millis: u64) -> bool {
        Command::new("PEXPIRE").arg(key).arg(millis)
    }

    /// TTL key
    fn ttl<K: ToRedisArgs>(key: K) -> i64 { Command::new("TTL").arg(key) }

    /// PTTL key
    fn pttl<K: ToRedisArgs>(key: K) -> i64 { Command::new("PTTL").arg(key) }

    /// PERSIST key
    fn persist<K: ToRedisArgs>(key: K) -> bool { Command::new("PERSIST").arg(key) }

    /// TYPE key
    fn key_type<K: ToRedisArgs>(key: K) -> String { Command::new("TYPE").arg(key) }

    /// RENAME key newkey
    fn rename<K: ToRedisArgs, N: ToRedisArgs>(key: K, new_key: N) -> () {
        Command::new("RENAME").arg(key).arg(new_key)
    }

    /// KEYS pattern
    fn keys<P: ToRedisArgs>(pattern: P) -> Vec<String> { Command::new("KEYS").arg(pattern) }

    // Strings

    /// GET key
    fn get<K: ToRedisArgs>(key: K) -> Option<Bytes> { Command::new("GET").arg(key) }

    /// SET key value
    fn set<K: ToRedisArgs, V: ToRedisArgs>(key: K, value: V) -> () {
        Command::new("SET").arg(key).arg(value)
    }

    /// SET key value PX milliseconds
    fn set_px<K: ToRedisArgs, V: ToRedisArgs>(key: K, value: V, millis: u64) -> () {
        Command::new("SET").arg(key).arg(value).arg("PX").arg(millis)
    }

    /// SET key value NX; `None` if the key already existed
    fn set_nx<K: ToRedisArgs, V: ToRedisArgs>(key: K, value: V) -> Option<String> {
        Command::new("SET").arg(key).arg(value).arg("NX")
    }

    /// GETDEL key
    fn get_del<K: ToRedisArgs>(key: K) -> Option<Bytes> { Command::new("GETDEL").arg(key) }

    /// MGET key [key ...]
    fn mget<K: ToRedisArgs>(keys: K) -> Vec<Option<Bytes>> { Command::new("MGET").arg(keys) }

    /// MSET key value [key value ...]
    fn mset<P: ToRedisArgs>(pairs: P) -> () { Command::new("MSET").arg(pairs) }

    /// INCR key
    fn incr<K: ToRedisArgs>(key: K) -> i64 { Command::new("INCR").arg(key) }

    /// INCRBY key increment
    fn incr_by<K: ToRedisArgs>(key: K, delta: i64) -> i64 {
        Command::new("INCRBY").arg(key).arg(delta)
    }

    /// DECR key
    fn decr<K: ToRedisArgs>(key: K) -> i64 { Command::new("DECR").arg(key) }

    /// DECRBY key decrement
    fn decr_by<K: ToRedisArgs>(key: K, delta: i64) -> i64 {
        Command::new("DECRBY").arg(key).arg(delta)
    }

    /// APPEND key value
    fn append<K: ToRedisArgs, V: ToRedisArgs>(key: K, value: V) -> i64 {
        Command::new("APPEND").arg(key).arg(value)
    }

    /// STRLEN key
    fn strlen<K: ToRedisArgs>(key: K) -> i64 { Command::new("STRLEN").arg(key) }

    // Hashes

    /// HGET key field
    fn hget<K: ToRedisArgs, F: ToRedisArgs>(key: K, field: F) -> Option<Bytes> {
        Command::new("HGET").arg(key).arg(field)
    }

    /// HSET key field value [field value ...]
    fn hset<K: ToRedisArgs, P: ToRedisArgs>(key: K, pairs: P) -> i64 {
        Command::new("HSET").arg(key).arg(pairs)
    }

    /// HDEL key field [field ...]
    fn hdel<K: ToRedisArgs, F: ToRedisArgs>(key: K, fields: F) -> i64 {
        Command::new("HDEL").arg(key).arg(fields)
    }

    /// HGETALL key
    fn hgetall<K: ToRedisArgs>(key: K) -> HashMap<String, Bytes> {
        Command::new("HGETALL").arg(key)
    }

    /// HEXISTS key field
    fn hexists<K: ToRedisArgs, F: ToRedisArgs>(key: K, field: F) -> bool {
        Command::new("HEXISTS").arg(key).arg(field)
    }

    /// HINCRBY key field increment
    fn hincr_by<K: ToRedisArgs, F: ToRedisArgs>(key: K, field: F, delta: i64) -> i64 {
        Command::new("HINCRBY").arg(key).arg(field).arg(delta)
    }

    /// HKEYS key
    fn hkeys<K: ToRedisArgs>(key: K) -> Vec<String> { Command::new("HKEYS").arg(key) }

    /// HLEN key
    fn hlen<K: ToRedisArgs>(key: K) -> i64 { Command::new("HLEN").arg(key) }

    // Lists

    /// LPUSH key element [element ...]
    fn lpush<K: ToRedisArgs, V: ToRedisArgs>(key: K, values: V) -> i64 {
        Command::new("LPUSH").arg(key).arg(values)
    }

    /// RPUSH key element [element ...]
    fn rpush<K: ToRedisArgs, V: ToRedisArgs>(key: K, values: V) -> i64 {
        Command::new("RPUSH").arg(key).arg(values)
    }

    /// LPOP key
    fn lpop<K: ToRedisArgs>(key: K) -> Option<Bytes> { Command::new("LPOP").arg(key) }

    /// RPOP key
    fn rpop<K: ToRedisArgs>(key: K) -> Option<Bytes> { Command::new("RPOP").arg(key) }

    /// LRANGE key start stop
    fn lrange<K: ToRedisArgs>(key: K, start: i64, stop: i64) -> Vec<Bytes> {
        Command::new("LRANGE").arg(key).arg(start).arg(stop)
    }

    /// LLEN key
    fn llen<K: ToRedisArgs>(key: K) -> i64 { Command::new("LLEN").arg(key) }

    /// BLPOP key [key ...] timeout; the server-side timeout is in seconds
    fn blpop<K: ToRedisArgs>(keys: K, seconds: f64) -> Option<Vec<Bytes>> {
        Command::new("BLPOP").arg(keys).arg(seconds)
    }

    // Sets

    /// SADD key member [member ...]
    fn sadd<K: ToRedisArgs, M: ToRedisArgs>(key: K, members: M) -> i64 {
        Command::new("SADD").arg(key).arg(members)
    }

    /// SREM key member [member ...]
    fn srem<K: ToRedisArgs, M: ToRedisArgs>(key: K, members: M) -> i64 {
        Command::new("SREM").arg(key).arg(members)
    }

    /// SMEMBERS key
    fn smembers<K: ToRedisArgs>(key: K) -> Vec<Bytes> { Command::new("SMEMBERS").arg(key) }

    /// SISMEMBER key member
    fn sismember<K: ToRedisArgs, M: ToRedisArgs>(key: K, member: M) -> bool {
        Command::new("SISMEMBER").arg(key).arg(member)
    }

    /// SCARD key
    fn scard<K: ToRedisArgs>(key: K) -> i64 { Command::new("SCARD").arg(key) }

    // Sorted sets

    /// ZADD key score member
    fn zadd<K: ToRedisArgs, M: ToRedisArgs>(key: K, score: f64, member: M) -> i64 {
        Command::new("ZADD").arg(key).arg(score).arg(member)
    }

    /// ZSCORE key member
    fn zscore<K: ToRedisArgs, M: ToRedisArgs>(key: K, member: M) -> Option<f64> {
        Command::new("ZSCORE").arg(key).arg(member)
    }

    /// ZRANGE key start stop
    fn zrange<K: ToRedisArgs>(key: K, start: i64, stop: i64) -> Vec<Bytes> {
        Command::new("ZRANGE").arg(key).arg(start).arg(stop)
    }

    /// ZREM key member [member ...]
    fn zrem<K: ToRedisArgs, M: ToRedisArgs>(key: K, members: M) -> i64 {
        Command::new("ZREM").arg(key).arg(members)
    }

    /// ZCARD key
    fn zcard<K: ToRedisArgs>(key: K) -> i64 { Command::new("ZCARD").arg(key) }

    // Scripting

    /// EVAL script numkeys key [key ...] arg [arg ...]
    fn eval<S: ToRedisArgs, K: ToRedisArgs, A: ToRedisArgs>(script: S, numkeys: usize, keys: K, args: A) -> RedisValue {
        Command::new("EVAL").arg(script).arg(numkeys).arg(keys).arg(args)
    }

    /// EVALSHA sha1 numkeys key [key ...] arg [arg ...]
    fn evalsha<S: ToRedisArgs, K: ToRedisArgs, A: ToRedisArgs>(sha: S, numkeys: usize, keys: K, args: A) -> RedisValue {
        Command::new("EVALSHA").arg(sha).arg(numkeys).arg(keys).arg(args)
    }

    /// SCRIPT LOAD script
    fn script_load<S: ToRedisArgs>(script: S) -> String {
        Command::new("SCRIPT").arg("LOAD").arg(script)
    }

    /// SCRIPT EXISTS sha1 [sha1 ...]
    fn script_exists<S: ToRedisArgs>(shas: S) -> Vec<bool> {
        Command::new("SCRIPT").arg("EXISTS").arg(shas)
    }

    /// SCRIPT FLUSH
    fn script_flush() -> () { Command::new("SCRIPT").arg("FLUSH") }

    // Pub/sub

    /// PUBLISH channel message
    fn publish<C: ToRedisArgs, M: ToRedisArgs>(channel: C, message: M) -> i64 {
        Command::new("PUBLISH").arg(channel).arg(message)
    }

    // Server

    /// DBSIZE
    fn dbsize() -> i64 { Command::new("DBSIZE") }

    /// FLUSHDB
    fn flushdb() -> () { Command::new("FLUSHDB") }

    /// INFO [section]
    fn info() -> String { Command::new("INFO") }

    /// TIME as (seconds, microseconds)
    fn time() -> Vec<i64> { Command::new("TIME") }

    /// CLUSTER NODES
    fn cluster_nodes() -> String { Command::new("CLUSTER").arg("NODES") }
}

impl<C: CommandSet + ?Sized> RedisCommands for C {}
