use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn sample() -> kotor_gff::Gff {
    use kotor_gff::{Gff, LocalizedString, TreeList, TreeStruct};

    let mut gff = Gff::default();
    let mut name = LocalizedString::from_string_ref(1234);
    name.set(0, false, "Creature");
    gff.root.insert("FirstName", name).unwrap();
    gff.root.insert("Tag", "bench_creature").unwrap();

    let items: TreeList = (0..200u32)
        .map(|i| {
            TreeStruct::new(i)
                .with("InventoryRes", format!("item_{i}"))
                .and_then(|s| s.with("Repos_PosX", i as u16))
                .and_then(|s| s.with("Dropable", 1u8))
                .unwrap()
        })
        .collect();
    gff.root.insert("ItemList", items).unwrap();
    gff
}

pub mod gff {
    use divan::Bencher;

    #[divan::bench]
    fn encode(bencher: Bencher) {
        let gff = super::sample();
        bencher.bench_local(|| divan::black_box(kotor_gff::encode(&gff).unwrap()));
    }

    #[divan::bench]
    fn decode(bencher: Bencher) {
        bencher
            .with_inputs(|| kotor_gff::encode(&super::sample()).unwrap())
            .bench_refs(|data| divan::black_box(kotor_gff::decode(data).unwrap()));
    }
}
