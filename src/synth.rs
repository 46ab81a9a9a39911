//! Synthetic listings generator
//!
//! Emits a semicolon-delimited export in the trainer's input shape with a
//! known linear relationship between attributes and price, so the whole
//! train-then-serve path can be exercised without real data. Deterministic
//! for a given seed.

use std::io::Write;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::train::ALLOWED_TYPES;

const CITIES: &[&str] = &["Campinas", "Guarulhos", "Santos", "São Paulo"];

/// Generator configuration
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Number of data rows to emit
    pub rows: usize,
    /// RNG seed
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self { rows: 150, seed: 42 }
    }
}

/// Write a synthetic export to a file
pub fn generate_file(config: &SynthConfig, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    generate(config, file)
}

/// Write a synthetic export to any writer
///
/// Price follows `800 + 35·area + 250·bedrooms + 150·parking + noise`, a
/// relationship the regression can recover. A few non-rental rows are mixed
/// in so the trainer's business filter has something to drop.
pub fn generate<W: Write>(config: &SynthConfig, writer: W) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

    wtr.write_record([
        "listing.pricingInfo.isRent",
        "imvl_type",
        "listing.usableAreas",
        "listing.bedrooms",
        "listing.bathrooms",
        "listing.parkingSpaces",
        "listing.address.city",
        "listing.pricingInfo.rentalPrice",
    ])?;

    for i in 0..config.rows {
        let area = rng.gen_range(20..300);
        let bedrooms = rng.gen_range(1..6);
        let bathrooms = rng.gen_range(1..4);
        let parking = rng.gen_range(0..4);
        let city = CITIES[rng.gen_range(0..CITIES.len())];
        let imvl_type = ALLOWED_TYPES[rng.gen_range(0..ALLOWED_TYPES.len())];
        let noise: i64 = rng.gen_range(-300..300);
        let price = 800 + area * 35 + bedrooms * 250 + parking * 150 + noise;
        let is_rent = i % 20 != 19;

        let record = [
            (if is_rent { "True" } else { "False" }).to_string(),
            imvl_type.to_string(),
            area.to_string(),
            bedrooms.to_string(),
            bathrooms.to_string(),
            parking.to_string(),
            city.to_string(),
            price.to_string(),
        ];
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
