use criterion::{black_box, criterion_group, criterion_main, Criterion};
use metering_rs::constants::{SML_END_SEQUENCE_PREFIX, SML_START_SEQUENCE};
use metering_rs::mbus::frame::{decode_long_frame, parse_frame};
use metering_rs::payload::VariableDataDecoder;
use metering_rs::sml::decode_readings;
use metering_rs::util::parse_hex_lenient;
use metering_rs::{ReadingLayout, SmlStream};

const HEAT_METER_FRAME: &str = "68 39 39 68 08 01 72 48 81 15 51 2D 2C 01 04 17 00 00 00 \
     04 06 39 30 00 00 04 13 A0 86 01 00 02 23 6D 01 04 2B C4 09 00 00 \
     04 3B 7D 00 00 00 02 5B 46 00 02 5F 32 00 02 61 D0 07 2F 2F E9 16";

const SML_BODY: &str = "76 01 01 01 01 01 00 \
     76 01 62 00 62 00 72 63 07 01 77 01 01 01 01 75 \
     77 01 01 01 62 1E 52 FF 65 00 00 00 00 01 \
     77 01 01 01 62 1E 52 FF 65 00 00 00 00 01 \
     77 01 01 01 62 1E 52 FF 65 00 BC 61 4E 01 \
     77 01 01 01 62 1E 52 FF 65 00 00 27 10 01 \
     77 01 01 01 62 1E 52 FF 55 00 00 05 DC 01 \
     01 01 63 12 34 00";

fn benchmark_mbus(c: &mut Criterion) {
    let Ok(frame) = parse_hex_lenient(HEAT_METER_FRAME) else {
        return;
    };

    c.bench_function("parse_frame", |b| {
        b.iter(|| {
            let _ = black_box(parse_frame(black_box(&frame)));
        })
    });

    let decoder = VariableDataDecoder::default();
    c.bench_function("decode_variable_data", |b| {
        b.iter(|| {
            if let Ok(user_data) = decode_long_frame(black_box(&frame)) {
                let _ = black_box(decoder.decode(user_data));
            }
        })
    });
}

fn benchmark_sml(c: &mut Criterion) {
    let Ok(body) = parse_hex_lenient(SML_BODY) else {
        return;
    };
    let layout = ReadingLayout::default();

    c.bench_function("sml_decode_readings", |b| {
        b.iter(|| {
            let _ = black_box(decode_readings(black_box(&body), 16, &layout));
        })
    });

    let mut framed = SML_START_SEQUENCE.to_vec();
    framed.extend_from_slice(&body);
    framed.extend_from_slice(&SML_END_SEQUENCE_PREFIX);
    framed.extend_from_slice(&[0x00, 0x12, 0x34]);

    c.bench_function("sml_stream_extract", |b| {
        let mut stream = SmlStream::default();
        b.iter(|| {
            for chunk in framed.chunks(64) {
                stream.push(chunk);
            }
            let _ = black_box(stream.extract_message());
        })
    });
}

criterion_group!(benches, benchmark_mbus, benchmark_sml);
criterion_main!(benches);
