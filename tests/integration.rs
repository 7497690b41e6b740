use redis::aio::MultiplexedConnection;
use redis::{RedisError, Value};
use std::thread;

use memkv::config::Config;
use memkv::server::{Server, ShutdownHandle};

async fn connect() -> Result<(MultiplexedConnection, ShutdownHandle), RedisError> {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };
    let server = Server::bind(&config).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.shutdown_handle();
    thread::spawn(move || server.run());

    let client = redis::Client::open(format!("redis://{}/", addr))?;
    let connection = client.get_multiplexed_async_connection().await?;

    Ok((connection, handle))
}

async fn query<T: redis::FromRedisValue>(
    connection: &mut MultiplexedConnection,
    args: &[&str],
) -> Result<T, RedisError> {
    let mut cmd = redis::cmd(args[0]);
    for arg in &args[1..] {
        cmd.arg(*arg);
    }
    cmd.query_async(connection).await
}

#[tokio::test]
async fn test_zadd_and_zscore() {
    let (mut c, handle) = connect().await.unwrap();

    let added: i64 = query(&mut c, &["ZADD", "scores", "1", "one", "2.5", "two"])
        .await
        .unwrap();
    assert_eq!(added, 2);

    let score: Option<String> = query(&mut c, &["ZSCORE", "scores", "two"]).await.unwrap();
    assert_eq!(score.as_deref(), Some("2.5"));

    let score: Option<String> = query(&mut c, &["ZSCORE", "scores", "three"])
        .await
        .unwrap();
    assert_eq!(score, None);

    let score: Option<String> = query(&mut c, &["ZSCORE", "missing", "one"]).await.unwrap();
    assert_eq!(score, None);

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_zadd_flags() {
    let (mut c, handle) = connect().await.unwrap();

    let changed: i64 = query(&mut c, &["ZADD", "k", "XX", "1", "a"]).await.unwrap();
    assert_eq!(changed, 0);
    let card: i64 = query(&mut c, &["ZCARD", "k"]).await.unwrap();
    assert_eq!(card, 0);

    let changed: i64 = query(&mut c, &["ZADD", "k", "NX", "1", "a"]).await.unwrap();
    assert_eq!(changed, 1);
    let changed: i64 = query(&mut c, &["ZADD", "k", "NX", "5", "a"]).await.unwrap();
    assert_eq!(changed, 0);
    let changed: i64 = query(&mut c, &["ZADD", "k", "xx", "5", "a"]).await.unwrap();
    assert_eq!(changed, 1);

    let score: Option<String> = query(&mut c, &["ZSCORE", "k", "a"]).await.unwrap();
    assert_eq!(score.as_deref(), Some("5"));

    let err = query::<Value>(&mut c, &["ZADD", "k", "NX", "XX", "1", "a"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not compatible"), "{err}");

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_ranks_and_ranges() {
    let (mut c, handle) = connect().await.unwrap();

    let _: i64 = query(
        &mut c,
        &["ZADD", "k", "2", "b", "1", "a", "2", "c", "-inf", "low"],
    )
    .await
    .unwrap();

    // Equal scores are ordered by member.
    let members: Vec<String> = query(&mut c, &["ZRANGE", "k", "0", "-1"]).await.unwrap();
    assert_eq!(members, vec!["low", "a", "b", "c"]);

    let members: Vec<String> = query(&mut c, &["ZRANGE", "k", "1", "2", "WITHSCORES"])
        .await
        .unwrap();
    assert_eq!(members, vec!["a", "1", "b", "2"]);

    let members: Vec<String> = query(&mut c, &["ZRANGE", "k", "10", "20"]).await.unwrap();
    assert!(members.is_empty());

    let rank: Option<i64> = query(&mut c, &["ZRANK", "k", "c"]).await.unwrap();
    assert_eq!(rank, Some(3));
    let rank: Option<i64> = query(&mut c, &["ZREVRANK", "k", "c"]).await.unwrap();
    assert_eq!(rank, Some(0));
    let rank: Option<i64> = query(&mut c, &["ZRANK", "k", "nobody"]).await.unwrap();
    assert_eq!(rank, None);

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_zrem_deletes_empty_key() {
    let (mut c, handle) = connect().await.unwrap();

    let _: i64 = query(&mut c, &["ZADD", "k", "1", "a", "2", "b"]).await.unwrap();

    let removed: i64 = query(&mut c, &["ZREM", "k", "a", "b", "c"]).await.unwrap();
    assert_eq!(removed, 2);

    let card: i64 = query(&mut c, &["ZCARD", "k"]).await.unwrap();
    assert_eq!(card, 0);
    let members: Vec<String> = query(&mut c, &["ZRANGE", "k", "0", "-1"]).await.unwrap();
    assert!(members.is_empty());

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_pipeline() {
    let (mut c, handle) = connect().await.unwrap();

    let (added, card, rank): (i64, i64, Option<i64>) = redis::pipe()
        .cmd("ZADD")
        .arg("k")
        .arg(3)
        .arg("x")
        .arg(4)
        .arg("y")
        .cmd("ZCARD")
        .arg("k")
        .cmd("ZRANK")
        .arg("k")
        .arg("y")
        .query_async(&mut c)
        .await
        .unwrap();

    assert_eq!((added, card, rank), (2, 2, Some(1)));

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_errors() {
    let (mut c, handle) = connect().await.unwrap();

    let err = query::<Value>(&mut c, &["ZADD", "k", "nan", "a"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a valid float"), "{err}");

    let err = query::<Value>(&mut c, &["ZCARD"]).await.unwrap_err();
    assert!(err.to_string().contains("wrong number of arguments"), "{err}");

    let err = query::<Value>(&mut c, &["ZRANGE", "k", "a", "1"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not an integer"), "{err}");

    let err = query::<Value>(&mut c, &["HSET", "k", "f", "v"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown command"), "{err}");

    let pong: String = query(&mut c, &["PING"]).await.unwrap();
    assert_eq!(pong, "PONG");

    handle.shutdown().unwrap();
}
