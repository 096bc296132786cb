//! Built-in conformance scenarios.
//!
//! Each scenario is self-contained: it creates everything it reads and
//! is meant to run against a fresh server and resource root.

use bytes::Bytes;
use davprobe_client::{Depth, PropertyName, PropertySet, StatusCode};

use crate::scenario::{Check, Expect, Scenario, StatusClass, Step};

/// Two-line text payload.
pub const DATA1: &str = "this is a file\nwith two lines";

/// Three-line text payload.
pub const DATA2: &str = "this is another file\nwith three lines\nsee?";

/// Number of lines in [`big_file`].
pub const BIG_FILE_LINES: usize = 10_000;

/// Length of each line in [`big_file`], newline included.
pub const BIG_FILE_LINE_LEN: usize = 1000;

/// A ~10 MB payload: numbered lines of dots.
pub fn big_file() -> Bytes {
    let dots = ".".repeat(BIG_FILE_LINE_LEN - 6 - 1);
    let mut data = String::with_capacity(BIG_FILE_LINES * BIG_FILE_LINE_LEN);
    for i in 0..BIG_FILE_LINES {
        data.push_str(&format!("{i:04}: {dots}\n"));
    }
    Bytes::from(data)
}

/// The dead property set by the reference scenario.
pub fn test_property() -> PropertyName {
    PropertyName::new("testns:", "testname")
}

/// Names of all built-in scenarios, in run order.
pub const NAMES: [&str; 8] = [
    "reference",
    "missing-resource",
    "put-semantics",
    "lock-exclusivity",
    "unlock-single-use",
    "copy-move",
    "property-roundtrip",
    "propfind-depth",
];

/// Every built-in scenario.
pub fn all() -> Vec<Scenario> {
    NAMES.iter().filter_map(|name| find(name)).collect()
}

/// Look up a built-in scenario by name.
pub fn find(name: &str) -> Option<Scenario> {
    let scenario = match name {
        "reference" => reference(),
        "missing-resource" => missing_resource(),
        "put-semantics" => put_semantics(),
        "lock-exclusivity" => lock_exclusivity(),
        "unlock-single-use" => unlock_single_use(),
        "copy-move" => copy_move(),
        "property-roundtrip" => property_roundtrip(),
        "propfind-depth" => propfind_depth(),
        _ => return None,
    };
    Some(scenario)
}

/// End-to-end walk through collections, content, locks, properties,
/// copy/move and a full-depth PROPFIND.
pub fn reference() -> Scenario {
    let big = big_file();
    Scenario::new("reference")
        .with_description("End-to-end: content, locks, properties, copy/move, full PROPFIND")
        .steps([
            Step::cleanup("/test/"),
            Step::mkcol("/test/"),
            Step::put_new("/test/file1.txt", DATA1),
            Step::put_new("/test/file2.txt", DATA2),
            Step::put_new("/test/bigfile.txt", big.clone()),
            Step::get("/test/file1.txt").check(Check::body(DATA1)),
            Step::put_replace("/test/file1.txt", DATA2),
            Step::get("/test/file1.txt").check(Check::body(DATA2)),
            Step::get("/test/bigfile.txt").check(Check::Body(big)),
            Step::put_replace("/test/file2.txt", DATA1),
            Step::get("/test/file2.txt").check(Check::body(DATA1)),
            Step::mkcol("/test/folder"),
            Step::lock_exclusive("/test/lock-0", "lock0"),
            Step::refresh_lock("/test/lock-0", "lock0"),
            Step::unlock("/test/lock-0", "lock0"),
            Step::unlock_consumed("/test/lock-0", "lock0"),
            Step::proppatch_set(
                "/test/file1.txt",
                PropertySet::new().with(test_property(), "testval"),
            ),
            Step::propfind("/test/file1.txt", Some(Depth::Zero)).check(Check::property_value(
                "/test/file1.txt",
                test_property(),
                "testval",
            )),
            Step::copy_replace("/test/file1.txt", "/test/file2.txt"),
            Step::get("/test/file2.txt").check(Check::body(DATA2)),
            Step::get("/test/file1.txt").check(Check::body(DATA2)),
            Step::move_("/test/file2.txt", "/test/file2_moved.txt"),
            Step::get_missing("/test/file2.txt"),
            Step::get("/test/file2_moved.txt").check(Check::body(DATA2)),
            Step::propfind("/", None)
                .check(Check::href("/test/folder"))
                .check(Check::href("/test/bigfile.txt"))
                .check(Check::href("/test/file2_moved.txt"))
                .check(Check::no_href("/test/file2.txt")),
        ])
}

/// Paths never created are 404 for every read.
pub fn missing_resource() -> Scenario {
    Scenario::new("missing-resource")
        .with_description("GET and PROPFIND of never-created paths return 404")
        .steps([
            Step::get_missing("/never-created.txt"),
            Step::mkcol("/empty/"),
            Step::get_missing("/empty/nothing.bin"),
            Step::get_missing("/no-parent/child.txt"),
            Step::propfind("/never-created.txt", Some(Depth::Zero))
                .expect_status(StatusCode::NOT_FOUND),
            Step::delete("/never-created.txt").expect_status(StatusCode::NOT_FOUND),
        ])
}

/// PUT is 201 when nothing was there and 204 otherwise, at any size.
pub fn put_semantics() -> Scenario {
    let big = big_file();
    let mut replacement = big.to_vec();
    replacement.reverse();
    let replacement = Bytes::from(replacement);

    Scenario::new("put-semantics")
        .with_description("PUT creates with 201 and replaces with 204, small or ~10 MB")
        .steps([
            Step::mkcol("/put/"),
            Step::put_new("/put/small.txt", DATA1),
            Step::put_replace("/put/small.txt", DATA2),
            Step::get("/put/small.txt").check(Check::body(DATA2)),
            Step::put_new("/put/big.txt", big),
            Step::put_replace("/put/big.txt", replacement.clone()),
            Step::get("/put/big.txt").check(Check::Body(replacement)),
            Step::put_replace("/put/small.txt", Bytes::new()),
            Step::get("/put/small.txt").check(Check::body(Bytes::new())),
            Step::delete("/put/small.txt"),
            Step::put_new("/put/small.txt", DATA1),
        ])
}

/// An exclusive lock excludes other locks and unauthenticated writes.
pub fn lock_exclusivity() -> Scenario {
    Scenario::new("lock-exclusivity")
        .with_description("Exclusive locks refuse second lockers and tokenless writes")
        .steps([
            Step::mkcol("/locks/"),
            Step::lock_exclusive("/locks/a.txt", "a"),
            Step::lock_conflict("/locks/a.txt"),
            Step::put_replace("/locks/a.txt", DATA1).expect(Expect::Rejected),
            Step::put_replace("/locks/a.txt", DATA1).with_lock("a"),
            Step::unlock("/locks/a.txt", "a"),
            // The resource exists now, so a new lock is 200 rather than 201
            Step::lock_exclusive("/locks/a.txt", "a2").expect(Expect::Class(StatusClass::Success)),
            Step::lock_conflict("/locks/a.txt"),
            Step::unlock("/locks/a.txt", "a2"),
            Step::lock_shared("/locks/shared.txt", "s1"),
            Step::lock_shared("/locks/shared.txt", "s2").expect(Expect::Class(StatusClass::Success)),
            Step::lock_conflict("/locks/shared.txt"),
            Step::unlock("/locks/shared.txt", "s1"),
            Step::unlock("/locks/shared.txt", "s2"),
        ])
}

/// A lock token releases its lock exactly once.
pub fn unlock_single_use() -> Scenario {
    Scenario::new("unlock-single-use")
        .with_description("A token unlocks once; the second UNLOCK is a client error")
        .steps([
            Step::mkcol("/unlock/"),
            Step::lock_exclusive("/unlock/r.txt", "t"),
            Step::refresh_lock("/unlock/r.txt", "t"),
            Step::refresh_lock("/unlock/r.txt", "t"),
            Step::unlock("/unlock/r.txt", "t"),
            Step::unlock_consumed("/unlock/r.txt", "t"),
            Step::unlock_consumed("/unlock/r.txt", "t"),
            Step::put_replace("/unlock/r.txt", DATA1),
        ])
}

/// COPY leaves the source alone; MOVE removes it.
pub fn copy_move() -> Scenario {
    Scenario::new("copy-move")
        .with_description("COPY/MOVE with Overwrite: 201 new, 204 replaced, 412 refused")
        .steps([
            Step::mkcol("/cm/"),
            Step::put_new("/cm/a.txt", DATA1),
            Step::copy("/cm/a.txt", "/cm/b.txt"),
            Step::get("/cm/a.txt").check(Check::body(DATA1)),
            Step::get("/cm/b.txt").check(Check::body(DATA1)),
            Step::put_new("/cm/c.txt", DATA2),
            Step::move_replace("/cm/b.txt", "/cm/c.txt"),
            Step::get_missing("/cm/b.txt"),
            Step::get("/cm/c.txt").check(Check::body(DATA1)),
            Step::copy("/cm/a.txt", "/cm/c.txt")
                .with_overwrite(false)
                .expect_status(StatusCode::PRECONDITION_FAILED),
            Step::get("/cm/c.txt").check(Check::body(DATA1)),
            Step::put_replace("/cm/c.txt", DATA2),
            Step::copy_replace("/cm/a.txt", "/cm/c.txt"),
            Step::get("/cm/c.txt").check(Check::body(DATA1)),
            Step::get("/cm/a.txt").check(Check::body(DATA1)),
            Step::mkcol("/cm/dir/"),
            Step::put_new("/cm/dir/inner.txt", DATA2),
            Step::copy("/cm/dir/", "/cm/dir-copy/"),
            Step::get("/cm/dir-copy/inner.txt").check(Check::body(DATA2)),
            Step::move_("/cm/dir/", "/cm/dir-moved/"),
            Step::get_missing("/cm/dir/inner.txt"),
            Step::get("/cm/dir-moved/inner.txt").check(Check::body(DATA2)),
        ])
}

/// PROPPATCH values are visible to PROPFIND, replaceable and removable.
pub fn property_roundtrip() -> Scenario {
    let name = test_property();
    let other = PropertyName::new("urn:davprobe:test", "markup");
    let markup = "a <b> & \"c\"";

    Scenario::new("property-roundtrip")
        .with_description("Dead properties round-trip through PROPPATCH and PROPFIND")
        .steps([
            Step::put_new("/props.txt", DATA1),
            Step::proppatch_set(
                "/props.txt",
                PropertySet::new()
                    .with(name.clone(), "testval")
                    .with(other.clone(), markup),
            ),
            Step::propfind_props("/props.txt", Some(Depth::Zero), vec![name.clone(), other.clone()])
                .check(Check::property_value("/props.txt", name.clone(), "testval"))
                .check(Check::property_value("/props.txt", other.clone(), markup)),
            Step::proppatch_set("/props.txt", PropertySet::new().with(name.clone(), "second")),
            Step::propfind("/props.txt", Some(Depth::Zero))
                .check(Check::property_value("/props.txt", name.clone(), "second")),
            Step::proppatch_remove("/props.txt", vec![name.clone()]),
            Step::propfind_props("/props.txt", Some(Depth::Zero), vec![name.clone()]).check(
                Check::property_status("/props.txt", name, StatusClass::ClientError),
            ),
            Step::move_("/props.txt", "/props-moved.txt"),
            Step::propfind("/props-moved.txt", Some(Depth::Zero))
                .check(Check::property_value("/props-moved.txt", other, markup)),
        ])
}

/// Depth 0, 1 and unspecified (infinity) enumerate progressively more.
pub fn propfind_depth() -> Scenario {
    Scenario::new("propfind-depth")
        .with_description("PROPFIND Depth 0/1/none enumerate self, children, descendants")
        .steps([
            Step::mkcol("/tree/"),
            Step::mkcol("/tree/sub/"),
            Step::put_new("/tree/sub/leaf.txt", DATA1),
            Step::propfind("/tree/", Some(Depth::Zero))
                .check(Check::href("/tree/"))
                .check(Check::no_href("/tree/sub/")),
            Step::propfind("/tree/", Some(Depth::One))
                .check(Check::href("/tree/sub/"))
                .check(Check::no_href("/tree/sub/leaf.txt")),
            Step::propfind("/tree/", None)
                .check(Check::href("/tree/sub/"))
                .check(Check::href("/tree/sub/leaf.txt")),
            Step::propfind("/tree/", Some(Depth::Infinity)).check(Check::href("/tree/sub/leaf.txt")),
        ])
}
