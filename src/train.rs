//! Offline trainer
//!
//! Reads a semicolon-delimited listings export, cleans and filters rows the
//! way the production dataset requires, one-hot encodes the categorical
//! attributes, fits an ordinary-least-squares linear regressor, and emits
//! the three serving artifacts: model, ordered column list, and metadata.
//!
//! The serving side never depends on this module at request time; the only
//! contract between the two is the artifact set.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{PreverError, Result};
use crate::model::{LinearModel, Regressor};
use crate::schema::{PriceRange, SchemaMetadata};

/// Residential property types kept for training
pub const ALLOWED_TYPES: &[&str] = &["apartamentos", "casas", "casas-de-condominio"];

/// Minimum number of listings a city needs to be kept
pub const MIN_CITY_LISTINGS: usize = 20;

/// Minimum coherent usable area in m²
pub const MIN_AREA_M2: f64 = 10.0;

/// IQR multiplier for outlier trimming
const IQR_FACTOR: f64 = 1.5;

const COL_IS_RENT: &str = "listing.pricingInfo.isRent";
const COL_TYPE: &str = "imvl_type";
const COL_AREA: &str = "listing.usableAreas";
const COL_BEDROOMS: &str = "listing.bedrooms";
const COL_BATHROOMS: &str = "listing.bathrooms";
const COL_PARKING: &str = "listing.parkingSpaces";
const COL_CITY: &str = "listing.address.city";
const COL_PRICE: &str = "listing.pricingInfo.rentalPrice";

/// One cleaned rental listing
#[derive(Debug, Clone)]
pub struct Listing {
    /// Usable area in m²
    pub area: f64,
    /// Bedroom count
    pub bedrooms: f64,
    /// Bathroom count
    pub bathrooms: f64,
    /// Parking space count
    pub parking: f64,
    /// City name as it appears in the export
    pub city: String,
    /// Property type
    pub imvl_type: String,
    /// Monthly rental price (the target)
    pub price: f64,
}

/// Trainer configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Semicolon-delimited listings export
    pub csv_path: PathBuf,
    /// Directory receiving the serving artifacts
    pub out_dir: PathBuf,
    /// Held-out fraction for evaluation
    pub test_fraction: f64,
    /// Shuffle seed; fixed default keeps runs reproducible
    pub seed: u64,
    /// Version tag written to the metadata artifact
    pub version: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("dataZAP.csv"),
            out_dir: PathBuf::from("models"),
            test_fraction: 0.2,
            seed: 42,
            version: "v0.8".to_string(),
        }
    }
}

/// Summary of a training run
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Rows in the raw export
    pub rows_read: usize,
    /// Rows surviving every cleaning step
    pub rows_kept: usize,
    /// Feature columns the model was fit on
    pub n_features: usize,
    /// R² on the held-out split
    pub r2: f64,
    /// Root mean squared error on the held-out split
    pub rmse: f64,
    /// Target range after cleaning
    pub price_range: PriceRange,
}

/// Design matrix with named columns, ready for fitting
#[derive(Debug)]
pub struct Encoded {
    /// Ordered feature-column names (the schema artifact)
    pub columns: Vec<String>,
    /// One row per listing, in column order
    pub rows: Vec<Vec<f64>>,
    /// Target values, parallel to `rows`
    pub targets: Vec<f64>,
}

/// Run the full training pipeline and write the serving artifacts
pub fn run(config: &TrainConfig) -> Result<TrainReport> {
    let file = fs::File::open(&config.csv_path)?;
    let (rows_read, listings) = parse_listings(file)?;
    log::info!(
        "{} rows read, {} rental rows within scope",
        rows_read,
        listings.len()
    );

    let listings = clean(listings);
    log::info!("{} rows kept after cleaning", listings.len());
    if listings.is_empty() {
        return Err(PreverError::Training(
            "no rows survive cleaning".to_string(),
        ));
    }

    let price_range = PriceRange {
        min: listings
            .iter()
            .map(|l| l.price)
            .fold(f64::INFINITY, f64::min),
        max: listings
            .iter()
            .map(|l| l.price)
            .fold(f64::NEG_INFINITY, f64::max),
    };

    let encoded = encode(&listings);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (train_idx, test_idx) = split_indices(encoded.rows.len(), config.test_fraction, &mut rng);

    let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| encoded.rows[i].clone()).collect();
    let train_targets: Vec<f64> = train_idx.iter().map(|&i| encoded.targets[i]).collect();
    let model = fit_ols(&train_rows, &train_targets)?;

    // Small datasets can leave the held-out split empty; evaluate on the
    // training rows then.
    let eval_idx = if test_idx.is_empty() {
        &train_idx
    } else {
        &test_idx
    };
    let mut predicted = Vec::with_capacity(eval_idx.len());
    let mut actual = Vec::with_capacity(eval_idx.len());
    for &i in eval_idx {
        predicted.push(model.predict(&encoded.rows[i])?);
        actual.push(encoded.targets[i]);
    }
    let r2 = r2_score(&actual, &predicted);
    let rmse = rmse(&actual, &predicted);

    export_artifacts(config, &model, &encoded.columns, r2, rmse, price_range)?;

    Ok(TrainReport {
        rows_read,
        rows_kept: listings.len(),
        n_features: encoded.columns.len(),
        r2,
        rmse,
        price_range,
    })
}

/// Parse the raw export, keeping rentals of the allowed property types with
/// fully numeric attributes
///
/// Returns the total row count alongside the kept listings. Rows with
/// uncoercible numerics are dropped, mirroring a coerce-then-dropna load.
pub fn parse_listings<R: Read>(reader: R) -> Result<(usize, Vec<Listing>)> {
    let mut rdr = csv::ReaderBuilder::new().delimiter(b';').from_reader(reader);

    let headers = rdr.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PreverError::Training(format!("missing column `{name}` in export")))
    };
    let idx_is_rent = col(COL_IS_RENT)?;
    let idx_type = col(COL_TYPE)?;
    let idx_area = col(COL_AREA)?;
    let idx_bedrooms = col(COL_BEDROOMS)?;
    let idx_bathrooms = col(COL_BATHROOMS)?;
    let idx_parking = col(COL_PARKING)?;
    let idx_city = col(COL_CITY)?;
    let idx_price = col(COL_PRICE)?;

    let mut rows_read = 0;
    let mut listings = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows_read += 1;

        if !matches!(
            record.get(idx_is_rent).map(str::trim),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1"
        ) {
            continue;
        }
        let imvl_type = record.get(idx_type).unwrap_or("").trim().to_string();
        if !ALLOWED_TYPES.contains(&imvl_type.as_str()) {
            continue;
        }

        let number = |idx: usize| -> Option<f64> {
            record
                .get(idx)?
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
        };
        let (Some(area), Some(bedrooms), Some(bathrooms), Some(parking), Some(price)) = (
            number(idx_area),
            number(idx_bedrooms),
            number(idx_bathrooms),
            number(idx_parking),
            number(idx_price),
        ) else {
            continue;
        };

        let city = record.get(idx_city).unwrap_or("").trim().to_string();
        if city.is_empty() {
            continue;
        }

        listings.push(Listing {
            area,
            bedrooms,
            bathrooms,
            parking,
            city,
            imvl_type,
            price,
        });
    }

    Ok((rows_read, listings))
}

/// Stability and outlier filters, in the order the pipeline applies them
fn clean(listings: Vec<Listing>) -> Vec<Listing> {
    let listings = filter_city_volume(listings, MIN_CITY_LISTINGS);
    let listings = iqr_trim(listings, |l| l.area);
    let mut listings = iqr_trim(listings, |l| l.price);
    listings.retain(|l| l.area > MIN_AREA_M2);
    listings
}

/// Keep only cities with enough listings to estimate a stable coefficient
fn filter_city_volume(listings: Vec<Listing>, min: usize) -> Vec<Listing> {
    let mut counts = std::collections::HashMap::new();
    for listing in &listings {
        *counts.entry(listing.city.clone()).or_insert(0usize) += 1;
    }
    listings
        .into_iter()
        .filter(|l| counts[&l.city] >= min)
        .collect()
}

/// Linearly interpolated quantile over a sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Drop rows outside `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` of the keyed value
fn iqr_trim(listings: Vec<Listing>, key: fn(&Listing) -> f64) -> Vec<Listing> {
    if listings.len() < 4 {
        return listings;
    }
    let mut values: Vec<f64> = listings.iter().map(key).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q1 = quantile(&values, 0.25);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - IQR_FACTOR * iqr;
    let upper = q3 + IQR_FACTOR * iqr;
    listings
        .into_iter()
        .filter(|l| {
            let v = key(l);
            v >= lower && v <= upper
        })
        .collect()
}

/// One-hot encode city and property type with a dropped reference category
///
/// Categories are sorted and the first one per attribute is dropped, so the
/// reference level is encoded as all-zeros. Numeric columns come first, in
/// the export's attribute order, then city dummies, then type dummies. The
/// resulting column order is the positional contract the serving side
/// receives as the schema artifact.
pub fn encode(listings: &[Listing]) -> Encoded {
    let cities: Vec<&String> = {
        let set: std::collections::BTreeSet<&String> =
            listings.iter().map(|l| &l.city).collect();
        set.into_iter().skip(1).collect()
    };
    let types: Vec<&String> = {
        let set: std::collections::BTreeSet<&String> =
            listings.iter().map(|l| &l.imvl_type).collect();
        set.into_iter().skip(1).collect()
    };

    let mut columns = vec![
        COL_AREA.to_string(),
        COL_BEDROOMS.to_string(),
        COL_BATHROOMS.to_string(),
        COL_PARKING.to_string(),
    ];
    columns.extend(cities.iter().map(|c| format!("{COL_CITY}_{c}")));
    columns.extend(types.iter().map(|t| format!("{COL_TYPE}_{t}")));

    let mut rows = Vec::with_capacity(listings.len());
    let mut targets = Vec::with_capacity(listings.len());
    for listing in listings {
        let mut row = vec![
            listing.area,
            listing.bedrooms,
            listing.bathrooms,
            listing.parking,
        ];
        for city in &cities {
            row.push(f64::from(u8::from(&listing.city == *city)));
        }
        for imvl_type in &types {
            row.push(f64::from(u8::from(&listing.imvl_type == *imvl_type)));
        }
        rows.push(row);
        targets.push(listing.price);
    }

    Encoded {
        columns,
        rows,
        targets,
    }
}

/// Shuffled train/test index split
fn split_indices(n: usize, test_fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let test_len = ((n as f64) * test_fraction).round() as usize;
    let test = indices[..test_len.min(n)].to_vec();
    let train = indices[test_len.min(n)..].to_vec();
    (train, test)
}

/// Fit ordinary least squares via the normal equations
///
/// Builds the design matrix with a leading intercept column and solves
/// `(XᵀX)β = Xᵀy` by Gaussian elimination with partial pivoting.
pub fn fit_ols(rows: &[Vec<f64>], targets: &[f64]) -> Result<LinearModel> {
    let n = rows.len();
    if n == 0 {
        return Err(PreverError::Training("no training rows".to_string()));
    }
    let p = rows[0].len();
    if n <= p {
        return Err(PreverError::Training(format!(
            "{n} rows cannot determine {p} coefficients"
        )));
    }

    let mut x = Array2::<f64>::zeros((n, p + 1));
    for (i, row) in rows.iter().enumerate() {
        x[[i, 0]] = 1.0;
        for (j, &v) in row.iter().enumerate() {
            x[[i, j + 1]] = v;
        }
    }
    let y = Array1::from(targets.to_vec());

    let xt = x.t();
    let xtx = xt.dot(&x);
    let xty = xt.dot(&y);

    let beta = solve(xtx, xty)?;
    Ok(LinearModel::new(beta[0], beta[1..].to_vec()))
}

/// Solve `A·x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| {
                a[[i, col]]
                    .abs()
                    .partial_cmp(&a[[j, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[[pivot_row, col]].abs() < 1e-10 {
            return Err(PreverError::Training(
                "singular normal equations (collinear features?)".to_string(),
            ));
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = a[[col, k]];
                a[[col, k]] = a[[pivot_row, k]];
                a[[pivot_row, k]] = tmp;
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[[row, k]] * x[k];
        }
        x[row] = acc / a[[row, row]];
    }
    Ok(x)
}

/// Coefficient of determination
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 0.0;
    }
    let mse: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n as f64;
    mse.sqrt()
}

fn export_artifacts(
    config: &TrainConfig,
    model: &LinearModel,
    columns: &[String],
    r2: f64,
    rmse: f64,
    price_range: PriceRange,
) -> Result<()> {
    fs::create_dir_all(&config.out_dir)?;

    model.save(&config.out_dir.join("modelo_imoveis.json"))?;

    let columns_json = serde_json::to_string_pretty(columns)
        .map_err(|e| PreverError::Internal(format!("columns serialization: {e}")))?;
    fs::write(config.out_dir.join("modelo_columns.json"), columns_json)?;

    let metadata = SchemaMetadata {
        version: config.version.clone(),
        n_features: columns.len(),
        feature_columns: columns.to_vec(),
        r2: Some(r2),
        rmse: Some(rmse),
        price_range: Some(price_range),
    };
    metadata.save(&config.out_dir.join("modelo_metadata.json"))?;

    Ok(())
}
