use hashbrown::{HashMap, HashSet};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::fs;
use std::path::Path;

use direction::CardinalDirection;
use wfc_image::mosaic::{MosaicTile, MosaicWfc, NeighborTable};
use wfc_image::simpletiled::{NeighborRule, SimpleTiledWfc, Tile};
use wfc_image::{Raster, Size, Symmetry};

use crate::config::{self, ConfigError, Job, JobHeader};
use crate::tileset::{self, RuleSet, TileDecl};

/// Attempts per screenshot before giving up on a contradicting rule set.
const RETRY_LIMIT: u32 = 10;

/// Outcome of up to `RETRY_LIMIT` seeded attempts: the seeds that
/// contradicted, and the first success if there was one.
struct Synthesis<T> {
    contradictions: Vec<u64>,
    success: Option<(u64, T)>,
}

/// Draw seeds from `seed_rng` and run `attempt` until it succeeds or the
/// attempt budget is spent. The front end resets itself per attempt, so
/// every attempt starts from the post-construction state.
fn synthesize<T, R: Rng>(
    seed_rng: &mut R,
    attempts: u32,
    attempt: &mut dyn FnMut(u64) -> Option<T>,
) -> Synthesis<T> {
    let mut contradictions = Vec::new();
    for _ in 0..attempts {
        let seed = seed_rng.gen();
        match attempt(seed) {
            Some(value) => {
                return Synthesis {
                    contradictions,
                    success: Some((seed, value)),
                }
            }
            None => contradictions.push(seed),
        }
    }
    Synthesis {
        contradictions,
        success: None,
    }
}

/// Run every screenshot of a job, reporting progress in the job protocol
/// and writing successful outputs under `output/`.
fn run_screenshots(
    header: &JobHeader,
    attempt: &mut dyn FnMut(u64) -> Option<Raster>,
) -> Result<(), ConfigError> {
    for shot in 0..header.screenshots {
        let mut seed_rng = XorShiftRng::seed_from_u64(shot as u64);
        let outcome = synthesize(&mut seed_rng, RETRY_LIMIT, attempt);
        for (retry, _seed) in outcome.contradictions.iter().enumerate() {
            println!("> {} CONTRADICTION {}", shot, retry);
        }
        match outcome.success {
            Some((seed, raster)) => {
                let path = format!("output/{}_{}.png", header.name, seed);
                raster
                    .to_image()
                    .save(&path)
                    .map_err(|e| ConfigError::Io(e.to_string()))?;
                println!("> {} DONE", shot);
            }
            None => println!("> {} FAILED", shot),
        }
    }
    Ok(())
}

fn load_raster(path: &str) -> Result<Raster, ConfigError> {
    let image = image::open(path).map_err(|e| ConfigError::Image {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(Raster::from_image(&image))
}

fn read_rule_set(path: &str) -> Result<RuleSet, ConfigError> {
    let xml =
        fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
    tileset::parse_rule_set(&xml)
}

/// Tiles surviving the subset filter, in document order.
fn selected_tiles<'a>(rule_set: &'a RuleSet, subset: &str) -> Vec<&'a TileDecl> {
    let filter: Option<HashSet<&str>> = rule_set
        .subset_filter(subset)
        .map(|names| names.iter().map(String::as_str).collect());
    rule_set
        .tiles
        .iter()
        .filter(|decl| match &filter {
            Some(names) => names.contains(decl.name.as_str()),
            None => true,
        })
        .collect()
}

fn symmetry_of(decl: &TileDecl) -> Result<Symmetry, ConfigError> {
    Symmetry::from_char(decl.symmetry).ok_or_else(|| ConfigError::UnknownSymmetry {
        tile: decl.name.clone(),
        symmetry: decl.symmetry.to_string(),
    })
}

fn run_overlapping(
    header: &JobHeader,
    pattern_size: u32,
    symmetry: u32,
    periodic_input: bool,
    ground: bool,
) -> Result<(), ConfigError> {
    use wfc_image::overlapping::{OverlappingOptions, OverlappingWfc};

    let input = load_raster(&format!("samples/{}.png", header.name))?;
    let options = OverlappingOptions {
        pattern_size,
        symmetry,
        periodic_input,
        periodic_output: header.periodic,
        ground,
        output_size: Size::new(header.width, header.height),
    };
    let mut front = OverlappingWfc::new(input, options)?;
    run_screenshots(header, &mut |seed| front.execute(seed))
}

fn run_simpletiled(header: &JobHeader, subset: &str) -> Result<(), ConfigError> {
    let rule_set = read_rule_set(&format!("tilesets/{}.xml", header.name))?;
    let directory = format!("tilesets/{}", header.name);

    let mut tiles = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();
    for decl in selected_tiles(&rule_set, subset) {
        let symmetry = symmetry_of(decl)?;
        let tile = if rule_set.unique {
            let images = (0..symmetry.orientations())
                .map(|k| load_raster(&format!("{}/{} {}.png", directory, decl.name, k)))
                .collect::<Result<Vec<_>, _>>()?;
            Tile::from_orientations(images, symmetry, decl.weight)
        } else {
            Tile::new(
                load_raster(&format!("{}/{}.png", directory, decl.name))?,
                symmetry,
                decl.weight,
            )
        };
        indices.insert(decl.name.clone(), tiles.len());
        tiles.push(tile);
    }

    // Rules naming tiles excluded by the subset are silently skipped; the
    // subset machinery exists precisely to carve such rules away.
    let mut rules = Vec::new();
    for rule in &rule_set.pair_rules {
        let (left_tile, right_tile) = match (indices.get(&rule.left), indices.get(&rule.right)) {
            (Some(&l), Some(&r)) => (l, r),
            _ => continue,
        };
        for (name, tile, orientation) in [
            (&rule.left, left_tile, rule.left_orientation),
            (&rule.right, right_tile, rule.right_orientation),
        ] {
            if orientation >= tiles[tile].symmetry.orientations() {
                return Err(ConfigError::OrientationOutOfRange {
                    tile: name.clone(),
                    orientation,
                });
            }
        }
        rules.push(NeighborRule {
            left_tile,
            left_orientation: rule.left_orientation,
            right_tile,
            right_orientation: rule.right_orientation,
        });
    }

    let size = Size::new(header.width, header.height);
    let mut front = SimpleTiledWfc::new(size, tiles, &rules, header.periodic)?;
    run_screenshots(header, &mut |seed| front.execute(seed))
}

fn run_imagemosaic(header: &JobHeader, subset: &str) -> Result<(), ConfigError> {
    let rule_set = read_rule_set(&format!("resources/{}.xml", header.name))?;
    let directory = format!("resources/{}", header.name);

    let declared: HashSet<&str> = rule_set.tiles.iter().map(|d| d.name.as_str()).collect();
    let mut tiles = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();
    for decl in selected_tiles(&rule_set, subset) {
        let image = load_raster(&format!("{}/{}.png", directory, decl.name))?;
        indices.insert(decl.name.clone(), tiles.len());
        tiles.push(MosaicTile {
            image,
            weight: decl.weight,
        });
    }

    let mut neighbors = NeighborTable::new(tiles.len());
    for rule in &rule_set.cell_rules {
        // A name absent from the rules file is a configuration error; one
        // merely excluded by the active subset just drops the rule.
        for name in [rule.tile.as_str(), rule.neighbor.as_str()] {
            if !declared.contains(name) {
                return Err(ConfigError::UnknownTile(name.to_string()));
            }
        }
        let (a, b) = match (indices.get(&rule.tile), indices.get(&rule.neighbor)) {
            (Some(&a), Some(&b)) => (a, b),
            _ => continue,
        };
        for (flag, direction) in [
            (rule.up, CardinalDirection::North),
            (rule.left, CardinalDirection::West),
            (rule.right, CardinalDirection::East),
            (rule.down, CardinalDirection::South),
        ] {
            if flag {
                neighbors.allow(direction, a, b);
            }
        }
    }

    let size = Size::new(header.width, header.height);
    let mut front = MosaicWfc::new(size, tiles, &neighbors, header.periodic)?;
    run_screenshots(header, &mut |seed| front.execute(seed))
}

/// Parse the job file and run every job in it.
pub fn run_all(job_file: &Path) -> Result<(), ConfigError> {
    let xml = fs::read_to_string(job_file)
        .map_err(|_| ConfigError::FileNotFound(job_file.display().to_string()))?;
    let jobs = config::parse_jobs(&xml)?;
    fs::create_dir_all("output").map_err(|e| ConfigError::Io(e.to_string()))?;

    for job in &jobs {
        println!("< {}", job.header().name);
        match job {
            Job::Overlapping {
                header,
                pattern_size,
                symmetry,
                periodic_input,
                ground,
            } => run_overlapping(header, *pattern_size, *symmetry, *periodic_input, *ground)?,
            Job::SimpleTiled { header, subset } => run_simpletiled(header, subset)?,
            Job::ImageMosaic { header, subset } => run_imagemosaic(header, subset)?,
        }
    }
    Ok(())
}
