use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vend_core::config::VendConfig;
use vend_core::token::{self, Token};
use vend_core::{Amount, PaymentMethod, PurchaseOrder, Vendor, Wallet};

/// Wallet operations per step (repeating):
/// 1. Credit 100
/// 2. Credit 50
/// 3. Debit 30
///
/// Debits never exceed the running balance.
fn run_wallet(wallet: &Wallet, ops: u32) {
    for step in 0..ops {
        let _ = match step % 3 {
            0 => black_box(wallet.credit(Amount::from_naira(100), "card")),
            1 => black_box(wallet.credit(Amount::from_naira(50), "ussd")),
            _ => black_box(wallet.debit(Amount::from_naira(30), "Electricity purchase")),
        };
    }
}

fn bench_token_generate(c: &mut Criterion) {
    c.bench_function("token_generate", |b| b.iter(|| black_box(Token::generate())));
}

fn bench_token_validate(c: &mut Criterion) {
    let tokens: Vec<String> = (0..1_000).map(|_| token::generate()).collect();

    c.bench_function("token_validate_1k", |b| {
        b.iter(|| {
            for t in &tokens {
                let _ = black_box(token::validate_checksum(t));
            }
        });
    });
}

fn bench_wallet(c: &mut Criterion) {
    let mut group = c.benchmark_group("wallet");

    for ops in [1_000u32, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(ops), &ops, |b, &ops| {
            b.iter(|| {
                let wallet = Wallet::new("bench");
                run_wallet(&wallet, ops);
                wallet
            });
        });
    }

    group.finish();
}

fn bench_purchases(c: &mut Criterion) {
    let mut group = c.benchmark_group("purchases");
    group.sample_size(10);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start runtime");
    let mut config = VendConfig::default();
    config.payment.success_rate = 1.0;
    config.wallet.opening_balance = Amount::from_naira(1_000_000_000);

    for count in [100u32, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                runtime.block_on(async {
                    let (vendor, store) = Vendor::in_memory(&config);
                    for i in 0..count {
                        let order = PurchaseOrder {
                            user_id: format!("user-{}", i % 10),
                            utility: "ekedc".to_string(),
                            meter_number: format!("450{i:08}"),
                            amount: Amount::from_naira(1_000),
                            payment_method: PaymentMethod::Wallet,
                            idempotency_key: None,
                        };
                        let _ = black_box(vendor.place(order).await);
                    }
                    store.len()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_token_generate,
    bench_token_validate,
    bench_wallet,
    bench_purchases,
);
criterion_main!(benches);
