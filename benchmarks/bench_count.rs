use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use tweetcount::cluster::{channel_mesh, Coordinator, Transport, WaitPolicy, WorkerAgent};
use tweetcount::decode::decode;
use tweetcount::input::Row;
use tweetcount::{count_partition, merge_all, CountTable, Matcher, Partition, Rank};

fn payload(i: usize) -> String {
    serde_json::json!({
        "text": format!("RT @user{}: shipping #release{} today, thanks @team and @user{}", i % 50, i % 8, i % 13),
        "id_str": i.to_string(),
        "source": "<a href=\"http://twitter.com/download/iphone\" rel=\"nofollow\">Twitter for iPhone</a>",
    })
    .to_string()
}

fn table(offset: usize, keys: usize) -> CountTable {
    (0..keys)
        .map(|k| format!("@user{}", k + offset))
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let raw = payload(7);
    c.bench_function("decode_tweet", |b| {
        b.iter(|| black_box(decode(black_box(&raw)).unwrap()));
    });
}

fn bench_match_mentions(c: &mut Criterion) {
    let matcher = Matcher::mentions();
    let text = "RT @alice: thanks @bob and @carol for #rustlang, cc @alice";
    c.bench_function("match_mentions", |b| {
        b.iter(|| black_box(matcher.count(black_box(text))));
    });
}

fn bench_match_search(c: &mut Criterion) {
    let matcher = Matcher::string_search("hello", true).unwrap();
    let text = "Hello world, hello again, othello says HELLO";
    c.bench_function("match_search_ignore_case", |b| {
        b.iter(|| black_box(matcher.count(black_box(text))));
    });
}

fn bench_merge(c: &mut Criterion) {
    let left = table(0, 5_000);
    let right = table(2_500, 5_000);
    c.bench_function("merge_5k_overlapping", |b| {
        b.iter_batched(
            || (left.clone(), right.clone()),
            |(l, r)| black_box(l.merge(r)),
            BatchSize::SmallInput,
        );
    });

    let parts: Vec<CountTable> = (0..16).map(|i| table(i * 100, 1_000)).collect();
    c.bench_function("merge_all_16_ranks", |b| {
        b.iter_batched(
            || parts.clone(),
            |parts| black_box(merge_all(parts)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_count_partition(c: &mut Criterion) {
    let payloads: Vec<String> = (0..10_000).map(payload).collect();
    let matcher = Matcher::topics();

    for world_size in [1u32, 4] {
        let partition = Partition::new(Rank::COORDINATOR, world_size).unwrap();
        c.bench_function(&format!("count_partition_10k_of_{}", world_size), |b| {
            b.iter(|| {
                let rows = payloads
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Ok(Row::record(i as u64, p.clone())));
                black_box(count_partition(rows, partition, &matcher).unwrap())
            });
        });
    }
}

fn bench_channel_exchange(c: &mut Criterion) {
    let worker_table = table(0, 1_000);
    c.bench_function("coordinator_exchange_4_ranks", |b| {
        b.iter(|| {
            let mut mesh = channel_mesh(4);
            let workers = mesh.split_off(1);
            std::thread::scope(|scope| {
                for mut transport in workers {
                    let table = worker_table.clone();
                    scope.spawn(move || {
                        let rank = transport.rank();
                        WorkerAgent::new(rank, table).serve(&mut transport, &WaitPolicy::unbounded())
                    });
                }
                let merged = Coordinator::new(4, WaitPolicy::unbounded())
                    .run(&mut mesh[0], CountTable::new())
                    .unwrap();
                black_box(merged)
            })
        });
    });
}

criterion_group!(
    count_benches,
    bench_decode,
    bench_match_mentions,
    bench_match_search,
    bench_merge,
    bench_count_partition,
    bench_channel_exchange
);
criterion_main!(count_benches);
