use kotor_common::ResRef;
use kotor_gff::error::{Error, Result};
use kotor_gff::{decode, encode, Field, FileType, Gff, LocalizedString, TreeList, TreeStruct};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

/// Small deterministic generator so failures reproduce from the seed alone
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn float(&mut self) -> f32 {
        (self.below(2_000_001) as f32 - 1_000_000.0) / 64.0
    }

    fn text(&mut self, max: u64) -> String {
        const ALPHABET: &[char] = &['a', 'Z', '0', ' ', '_', 'é', 'ß', '中', '\n'];
        (0..self.below(max + 1))
            .map(|_| ALPHABET[self.below(ALPHABET.len() as u64) as usize])
            .collect()
    }

    fn ascii(&mut self, max: u64) -> String {
        (0..self.below(max + 1))
            .map(|_| (b'a' + self.below(26) as u8) as char)
            .collect()
    }
}

fn random_field(rng: &mut XorShift, depth: u32, budget: &mut u32) -> Result<Field> {
    let nested = depth < 8 && *budget > 0;
    let kind = rng.below(if nested { 18 } else { 16 });
    Ok(match kind {
        0 => Field::UInt8(rng.next() as u8),
        1 => Field::Int8(rng.next() as i8),
        2 => Field::UInt16(rng.next() as u16),
        3 => Field::Int16(rng.next() as i16),
        4 => Field::UInt32(rng.next() as u32),
        5 => Field::Int32(rng.next() as i32),
        6 => Field::UInt64(rng.next()),
        7 => Field::Int64(rng.next() as i64),
        8 => Field::Single(rng.float()),
        9 => Field::Double(rng.float() as f64 * 3.0),
        10 => Field::String(rng.text(40)),
        11 => Field::ResRef(ResRef::new(rng.ascii(16))?),
        12 => {
            let mut loc = LocalizedString {
                string_ref: (rng.below(2) == 0).then(|| rng.next() as u32 >> 1),
                ..Default::default()
            };
            for _ in 0..rng.below(4) {
                let language = rng.below(10) as u32;
                let text = rng.text(20);
                loc.set(language, rng.below(2) == 0, text);
            }
            Field::LocString(loc)
        }
        13 => Field::Binary((0..rng.below(64)).map(|_| rng.next() as u8).collect()),
        14 => Field::Vector3([rng.float(), rng.float(), rng.float()]),
        15 => Field::Vector4([rng.float(), rng.float(), rng.float(), rng.float()]),
        16 => {
            *budget -= 1;
            Field::Struct(random_struct(rng, depth + 1, budget)?)
        }
        _ => {
            *budget -= 1;
            let len = rng.below(51);
            let mut list = TreeList::new();
            for _ in 0..len {
                if *budget == 0 {
                    break;
                }
                *budget -= 1;
                list.push(random_struct(rng, depth + 1, budget)?);
            }
            Field::List(list)
        }
    })
}

fn random_struct(rng: &mut XorShift, depth: u32, budget: &mut u32) -> Result<TreeStruct> {
    let mut tree = TreeStruct::new(rng.next() as u32);
    for i in 0..rng.below(8) {
        let label = format!("{}{i}", rng.ascii(10));
        tree.insert(&label, random_field(rng, depth, budget)?)?;
    }
    Ok(tree)
}

fn random_gff(seed: u64) -> Result<Gff> {
    let mut rng = XorShift(seed);
    let mut budget = 200;
    let mut gff = Gff::new(FileType(*b"UTC "));
    gff.root = random_struct(&mut rng, 0, &mut budget)?;
    Ok(gff)
}

#[test]
fn random_trees_round_trip() -> Result<()> {
    for seed in 1..=200u64 {
        let gff = random_gff(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15))?;
        let bytes = encode(&gff)?;
        assert_eq!(decode(&bytes)?, gff, "seed {seed}");
    }
    Ok(())
}

#[test]
fn encoding_is_stable() -> Result<()> {
    let gff = random_gff(0xDEAD_BEEF)?;
    let once = encode(&gff)?;
    let twice = encode(&decode(&once)?)?;
    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn wide_lists_and_deep_chains() -> Result<()> {
    let wide: TreeList = (0..50u32)
        .map(|i| TreeStruct::new(i).with("Index", i))
        .collect::<Result<_>>()?;

    let mut deep = TreeStruct::new(8).with("Leaf", "bottom")?;
    for level in (0..8u32).rev() {
        deep = TreeStruct::new(level).with("Child", deep)?;
    }

    let root = TreeStruct::new(u32::MAX)
        .with("Wide", wide)?
        .with("Deep", deep)?;
    let gff = Gff {
        file_type: FileType::GFF,
        root,
    };

    assert_eq!(decode(&encode(&gff)?)?, gff);
    Ok(())
}

#[test]
fn very_deep_nesting_does_not_recurse() -> Result<()> {
    let mut tree = TreeStruct::new(0);
    for level in 0..1_000u32 {
        tree = TreeStruct::new(level).with("Next", tree)?;
    }
    let bytes = kotor_gff::encode_struct(&tree)?;
    let decoded = kotor_gff::decode_struct(&bytes)?;

    let mut depth = 0;
    let mut cursor = &decoded;
    while let Some(Field::Struct(next)) = cursor.get("Next") {
        depth += 1;
        cursor = next;
    }
    assert_eq!(depth, 1_000);
    Ok(())
}

#[traced_test]
#[test]
fn mutated_buffers_never_panic() -> Result<()> {
    let mut rng = XorShift(0x1234_5678);
    for seed in 1..=20u64 {
        let valid = encode(&random_gff(seed)?)?;

        for _ in 0..200 {
            let mut bytes = valid.clone();
            match rng.below(3) {
                0 => bytes.truncate(rng.below(bytes.len() as u64) as usize),
                1 => {
                    for _ in 0..=rng.below(4) {
                        let at = rng.below(bytes.len() as u64) as usize;
                        bytes[at] = rng.next() as u8;
                    }
                }
                _ => {
                    // aim at the header and tables, where offsets live
                    let limit = bytes.len().min(256) as u64;
                    let at = rng.below(limit.saturating_sub(4).max(1)) as usize;
                    let value = (rng.next() as u32).to_le_bytes();
                    let end = (at + 4).min(bytes.len());
                    bytes[at..end].copy_from_slice(&value[..end - at]);
                }
            }

            match decode(&bytes) {
                Ok(_) => {}
                Err(Error::MalformedTree { .. } | Error::TruncatedData { .. }) => {}
                Err(Error::BinRWError(_)) => {}
                Err(other) => panic!("unexpected error kind: {other}"),
            }
        }
    }
    Ok(())
}
