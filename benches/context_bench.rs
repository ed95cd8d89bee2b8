use context_engine::config::{Config, WindowConfig};
use context_engine::context::token_estimator::{HeuristicEstimator, TokenEstimator};
use context_engine::context::{ContextManager, ContextServices, IncomingMessage, MessageEnhancer};
use context_engine::persistence::MemoryStore;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const SAMPLE: &str = "Could you compare the hotel prices near the old town in Lisbon for \
    the first week of June? We have a budget of about 900 dollars and would like to be close \
    to the restaurants and the tram line.";

fn bench_estimation(c: &mut Criterion) {
    let estimator = HeuristicEstimator::default();
    c.bench_function("heuristic_estimate", |b| {
        b.iter(|| estimator.estimate(black_box(SAMPLE)))
    });
}

fn bench_enhancement(c: &mut Criterion) {
    let enhancer = MessageEnhancer::with_defaults(Arc::new(HeuristicEstimator::default()));
    let previous = enhancer.enhance(IncomingMessage::user("Planning a trip to Portugal"), None);
    c.bench_function("enhance_message", |b| {
        b.iter(|| enhancer.enhance(IncomingMessage::user(black_box(SAMPLE)), Some(&previous)))
    });
}

fn bench_conversation(c: &mut Criterion) {
    let mut config = Config::default();
    config.window = WindowConfig {
        max_window_size: 20,
        max_tokens: 2000,
        token_buffer: 400,
        ..WindowConfig::default()
    };

    c.bench_function("add_50_messages_with_optimization", |b| {
        b.iter(|| {
            tokio_test::block_on(async {
                let services =
                    ContextServices::new(config.clone(), None, Arc::new(MemoryStore::new()))
                        .unwrap();
                let mut manager = ContextManager::new("bench", services);
                manager.initialize_context(Vec::new()).await.unwrap();
                for i in 0..50 {
                    let message = if i % 2 == 0 {
                        IncomingMessage::user(SAMPLE)
                    } else {
                        IncomingMessage::assistant(SAMPLE)
                    };
                    manager.add_message(message).await.unwrap();
                }
                black_box(manager.get_context_for_model().unwrap())
            })
        })
    });
}

criterion_group!(benches, bench_estimation, bench_enhancement, bench_conversation);
criterion_main!(benches);
