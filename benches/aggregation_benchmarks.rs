use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use show_admin::gpio::sources::{
    CapeOutput, CapeOutputGroup, ChannelOutputDocument, ChannelOutputEntry, GpioInputEntry, GpioRef,
};
use show_admin::gpio::ConfigDocuments;
use show_admin::{AggregatorConfig, GpioAggregator, PinRecord};

/// Synthetic inventory of `count` pins spread over four chips and two PRUs.
fn inventory(count: u32) -> Vec<PinRecord> {
    (0..count)
        .map(|i| {
            PinRecord::new(format!("P{}-{}", 8 + i % 2, i))
                .with_line(i % 4, i / 4)
                .with_pru(i % 2, i % 16)
        })
        .collect()
}

/// Documents claiming roughly a third of the pins, with overlaps.
fn documents(count: u32) -> ConfigDocuments {
    let gpio_inputs = (0..count)
        .step_by(5)
        .map(|i| GpioInputEntry {
            pin: format!("P{}-{}", 8 + i % 2, i),
            enabled: true,
            desc: format!("Input {}", i),
        })
        .collect();

    let channel_outputs = (0..count)
        .step_by(7)
        .map(|i| ChannelOutputEntry {
            output_type: "GPIO".to_string(),
            enabled: true,
            gpio: Some(GpioRef::Name(format!("P{}-{}", 8 + i % 2, i))),
            description: format!("Relay {}", i),
            sub_type: None,
        })
        .collect();

    let latched = (0..48)
        .map(|i| {
            Some(CapeOutput {
                pin: None,
                pru: Some(i % 2),
                pru_pin: Some(i % 16),
            })
        })
        .collect();

    ConfigDocuments {
        gpio_inputs: Some(gpio_inputs),
        channel_outputs: Some(ChannelOutputDocument { channel_outputs }),
        cape_inputs: None,
        pwm: Vec::new(),
        strings: vec![CapeOutputGroup {
            output_type: "BBB48String".to_string(),
            sub_type: "F48".to_string(),
            outputs: latched,
        }],
    }
}

/// Benchmark aggregation over growing inventories
fn bench_aggregation(c: &mut Criterion) {
    let aggregator = GpioAggregator::new(
        AggregatorConfig::new("BeagleBone Black").with_cape_name(Some("F48".to_string())),
    );

    for size in [64u32, 256, 1024].iter() {
        let pins = inventory(*size);
        let docs = documents(*size);
        c.bench_with_input(BenchmarkId::new("aggregate_documents", size), size, |b, _| {
            b.iter(|| aggregator.aggregate_documents(black_box(pins.clone()), black_box(&docs)))
        });
    }
}

/// Benchmark serializing the annotated pin list
fn bench_serialization(c: &mut Criterion) {
    let aggregator = GpioAggregator::new(AggregatorConfig::new("BeagleBone Black"));
    let pins = aggregator.aggregate_documents(inventory(256), &documents(256));

    c.bench_function("pin_list_serialization", |b| {
        b.iter(|| serde_json::to_string(black_box(&pins)).expect("Should serialize"))
    });
}

criterion_group!(benches, bench_aggregation, bench_serialization);
criterion_main!(benches);
