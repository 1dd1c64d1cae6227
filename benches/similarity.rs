use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use metz_pipeline::ingest::parse_statsbomb_players_json;
use metz_pipeline::normalize::normalize_name;
use metz_pipeline::similarity::name_similarity;

const NAMES: &[&str] = &[
    "Jean Dupont",
    "J. Dupont",
    "Warren Zaïre-Emery",
    "Zaire Emery",
    "Benjamin Stambouli",
    "Habibou Mouhamadou Diarra",
    "Habib Diarra",
    "Conrad Jonathan Egan-Riley",
    "CJ Egan-Riley",
    "Kylian Mbappé",
    "Erling Haaland",
    "N'Golo Kanté",
    "Paul Pogba",
    "Matz Sels",
    "Mathias Sels",
    "Christian Kouakou Bedia",
];

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_name", |b| {
        b.iter(|| {
            for name in NAMES {
                black_box(normalize_name(black_box(name)));
            }
        })
    });
}

fn bench_similarity_grid(c: &mut Criterion) {
    // All-pairs scoring mirrors the resolver's anchor-by-candidate loop.
    c.bench_function("similarity_grid", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for a in NAMES {
                for b in NAMES {
                    total += name_similarity(black_box(a), black_box(b));
                }
            }
            black_box(total);
        })
    });
}

fn bench_export_parse(c: &mut Criterion) {
    c.bench_function("statsbomb_export_parse", |b| {
        b.iter(|| {
            let players = parse_statsbomb_players_json(black_box(STATSBOMB_JSON)).unwrap();
            black_box(players.len());
        })
    });
}

criterion_group!(
    similarity,
    bench_normalize,
    bench_similarity_grid,
    bench_export_parse
);
criterion_main!(similarity);

static STATSBOMB_JSON: &str = include_str!("../tests/fixtures/statsbomb_players.json");
