/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Performance benchmarks for the two operations on the hot path of every
//! authenticated SMTP session: bcrypt password verification and ARC
//! sealing of an outbound message.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smtp::auth::arc::{sign_arc, MethodResult};

const TEST_MESSAGE: &[u8] = b"From: sender@example.com\r\n\
To: recipient@example.com\r\n\
Subject: Benchmark message\r\n\
Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
Message-ID: <bench@example.com>\r\n\
\r\n\
This is the body used to benchmark ARC sealing.\r\n";

fn bench_bcrypt_verify(c: &mut Criterion) {
    let hash = pwhash::bcrypt::hash("correct horse battery staple").unwrap();

    let mut group = c.benchmark_group("bcrypt");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function("verify_correct_password", |b| {
        b.iter(|| {
            black_box(directory::verify_password(
                black_box("correct horse battery staple"),
                black_box(&hash),
            ))
        });
    });

    group.bench_function("verify_wrong_password", |b| {
        b.iter(|| black_box(directory::verify_password(black_box("wrong password"), black_box(&hash))));
    });

    group.finish();
}

fn bench_arc_signing(c: &mut Criterion) {
    let key = directory::testing::generate_dkim_key("example.com", "bench");
    let results = vec![MethodResult::new("dkim", "pass"), MethodResult::new("spf", "pass")];

    let mut group = c.benchmark_group("arc_signing");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function("sign_single_hop", |b| {
        b.iter(|| {
            black_box(sign_arc(
                black_box(TEST_MESSAGE),
                black_box(&key),
                black_box("pass"),
                black_box(&results),
                black_box("mx.example.com"),
                black_box(1_700_000_000),
            ))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bcrypt_verify, bench_arc_signing);
criterion_main!(benches);
