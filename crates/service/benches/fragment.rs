use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rtpchat_service::Channel;

fn criterion_benchmark(c: &mut Criterion) {
    let sender = Channel::new();
    let receiver = Channel::new();
    let message = vec![0xabu8; 4096];

    let mut channel_criterion = c.benchmark_group("channel");

    channel_criterion.throughput(Throughput::Bytes(message.len() as u64));
    channel_criterion.bench_function("fragment_and_reassemble", |bencher| {
        bencher.iter(|| {
            for packet in sender.send(&message).unwrap() {
                receiver.recv(&packet).unwrap();
            }
        })
    });

    channel_criterion.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
