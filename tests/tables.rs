use nametree::{
    tables::strategy_choice::InsertResult, FaceToken, Name, Tables, TablesConfig, Timestamp,
};

const MULTICAST: &str = "/localhost/nfd/strategy/multicast";

fn name(uri: &str) -> Name {
    uri.parse().unwrap()
}

fn tables() -> Tables {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = TablesConfig {
        strategies: vec![MULTICAST.to_string()],
        ..TablesConfig::default()
    };
    Tables::new(&config).unwrap()
}

#[test]
fn test_interest_data_exchange() {
    let mut t = tables();
    let now = Timestamp::from_ms(1_000);
    t.fib
        .add_or_update_next_hop(&mut t.name_tree, &name("/video"), FaceToken(7), 10)
        .unwrap();

    // Interest arrives and is forwarded along the longest matching route
    let interest = name("/video/clip/seg=1");
    let (pit, is_new) = t.pit.insert(
        &mut t.name_tree,
        &interest,
        false,
        FaceToken(1),
        [1, 2, 3, 4],
        None,
        now,
    );
    assert!(is_new);
    let route = t.fib.find_longest_prefix_match(&t.name_tree, &interest).unwrap();
    assert_eq!(route.prefix(), &name("/video"));
    assert_eq!(route.next_hops()[0].face, FaceToken(7));

    // Same Interest from another face aggregates
    let (again, is_new) = t.pit.insert(
        &mut t.name_tree,
        &interest,
        false,
        FaceToken(2),
        [5, 6, 7, 8],
        None,
        now,
    );
    assert!(!is_new);
    assert_eq!(again, pit);
    assert_eq!(t.pit.get(pit).unwrap().in_records().len(), 2);

    // Data satisfies it, then the PIT entry goes and its tree entries with it
    let matches = t.pit.find_all_data_matches(&t.name_tree, &interest, None);
    assert_eq!(matches, vec![pit]);
    let before = t.name_tree.len();
    assert!(t.pit.erase(&mut t.name_tree, pit));
    assert_eq!(t.name_tree.len(), before - 2);
    assert!(t.name_tree.find_exact_match(&name("/video")).is_some());
    assert!(t.name_tree.find_exact_match(&name("/video/clip")).is_none());
}

#[test]
fn test_prefix_interests_match_deeper_data() {
    let mut t = tables();
    let now = Timestamp::from_ms(0);
    let (short, _) = t.pit.insert(
        &mut t.name_tree,
        &name("/a"),
        true,
        FaceToken(1),
        [0; 4],
        None,
        now,
    );
    let (exact, _) = t.pit.insert(
        &mut t.name_tree,
        &name("/a/b"),
        false,
        FaceToken(1),
        [1; 4],
        None,
        now,
    );
    let (other, _) = t.pit.insert(
        &mut t.name_tree,
        &name("/a/c"),
        true,
        FaceToken(1),
        [2; 4],
        None,
        now,
    );

    let matches = t.pit.find_all_data_matches(&t.name_tree, &name("/a/b"), None);
    assert_eq!(matches, vec![short, exact]);
    assert!(!matches.contains(&other));
}

#[test]
fn test_strategy_choice_follows_prefixes() {
    let mut t = tables();
    let default = name(nametree::config::DEFAULT_STRATEGY);
    let multicast = name(MULTICAST);

    assert_eq!(
        t.strategy_choice.insert(
            &mut t.name_tree,
            &mut t.measurements,
            &name("/live"),
            multicast.clone()
        ),
        InsertResult::Ok
    );
    assert_eq!(
        t.strategy_choice.insert(
            &mut t.name_tree,
            &mut t.measurements,
            &name("/live/x"),
            name("/localhost/nfd/strategy/unknown")
        ),
        InsertResult::NotRegistered
    );
    assert_eq!(
        t.strategy_choice
            .find_effective_strategy(&t.name_tree, &name("/live/stream/1")),
        Some(&multicast)
    );
    assert_eq!(
        t.strategy_choice
            .find_effective_strategy(&t.name_tree, &name("/other")),
        Some(&default)
    );

    assert!(t
        .strategy_choice
        .erase(&mut t.name_tree, &mut t.measurements, &name("/live")));
    assert_eq!(
        t.strategy_choice
            .find_effective_strategy(&t.name_tree, &name("/live/stream/1")),
        Some(&default)
    );
    assert_eq!(t.name_tree.len(), 1);
}

#[test]
fn test_pruning_keeps_live_state() {
    let mut t = tables();
    let now = Timestamp::from_ms(0);
    t.fib
        .add_or_update_next_hop(&mut t.name_tree, &name("/a"), FaceToken(3), 1)
        .unwrap();
    t.pit.insert(
        &mut t.name_tree,
        &name("/a/short"),
        false,
        FaceToken(1),
        [0; 4],
        Some(100),
        now,
    );
    t.pit.insert(
        &mut t.name_tree,
        &name("/a/long"),
        false,
        FaceToken(1),
        [1; 4],
        Some(60_000),
        now,
    );
    t.measurements.get(&mut t.name_tree, &name("/a/b/c"), now);

    t.prune_if_needed(now.adding(5_000));
    assert_eq!(t.pit.len(), 1);
    assert!(t.measurements.is_empty());
    assert!(t.name_tree.find_exact_match(&name("/a/short")).is_none());
    assert!(t.name_tree.find_exact_match(&name("/a/b")).is_none());
    assert!(t.name_tree.find_exact_match(&name("/a/long")).is_some());

    // Losing the only downstream face empties the PIT
    t.remove_face(FaceToken(1));
    assert!(t.pit.is_empty());
    assert_eq!(t.fib.len(), 1);
    assert_eq!(t.name_tree.len(), 2);
}
