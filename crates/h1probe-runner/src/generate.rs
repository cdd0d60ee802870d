//! Seeded case generation

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use h1probe_core::{Expectation, RequestTemplate, TestCase};

pub const RANDOM_CATEGORY: &str = "Random Paths";

const PATH_LEN: usize = 10;

/// `count` GET requests for random ten-letter lowercase paths, each expected
/// to be 404. The same seed always yields the same paths.
#[must_use]
pub fn random_paths(seed: u64, count: usize) -> Vec<TestCase> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let path: String = (0..PATH_LEN)
                .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                .collect();
            let request =
                RequestTemplate::new("GET", format!("/{path}")).header("Host", "localhost");
            TestCase::structured(
                format!("GET random path /{path}"),
                RANDOM_CATEGORY,
                &request,
                Expectation::exactly(404),
            )
        })
        .collect()
}
