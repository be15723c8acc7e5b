use std::fs;
use std::path::Path;

use osm_audit::config::UserConfig;
use osm_audit::etl::audit::AuditEtl;
use osm_audit::etl::query::{read_documents, QueryEtl};
use osm_audit::etl::transform::TransformEtl;
use osm_audit::etl::Etl;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const OSM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="47.45" minlon="19.0" maxlat="47.55" maxlon="19.1"/>
  <node id="100" lat="47.4979" lon="19.0402" user="anna" uid="1" version="2" changeset="9" timestamp="2016-03-01T10:00:00Z">
    <tag k="amenity" v="restaurant"/>
    <tag k="cuisine" v="hungarian"/>
    <tag k="addr:street" v="váci utca"/>
    <tag k="addr:postcode" v="H-1052"/>
    <tag k="addr:housenumber" v="12"/>
    <tag k="phone" v="06 1 234 5678"/>
    <tag k="email" v="info@vaci.hu"/>
  </node>
  <node id="101" lat="47.5012" lon="19.0551" user="bela" uid="2">
    <tag k="amenity" v="restaurant"/>
    <tag k="cuisine" v="pizza"/>
    <tag k="addr:street" v="Kucsma"/>
    <tag k="addr:postcode" v="1507"/>
    <tag k="phone" v="+36 1 111"/>
  </node>
  <node id="102" lat="46.9" lon="19.7" user="anna" uid="1"/>
  <way id="200" user="anna" uid="1">
    <nd ref="100"/>
    <nd ref="101"/>
    <tag k="highway" v="pedestrian"/>
    <tag k="addr:street:old" v="Régi utca"/>
  </way>
  <relation id="300" user="csaba" uid="3">
    <member type="way" ref="200" role="outer"/>
    <tag k="name" v="Belváros"/>
  </relation>
</osm>
"#;

const STREET_TYPES: &str = "utca: Váci utca\nút: Andrássy út\ntér: Deák Ferenc tér\n";

struct Fixture {
    _tmp: TempDir,
    config: UserConfig,
    output_dir: std::path::PathBuf,
}

fn fixture(output_format: &str, osm: &str) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let data_path = tmp.path().join("budapest.osm");
    let street_types_path = tmp.path().join("street_types.txt");
    fs::write(&data_path, osm).unwrap();
    fs::write(&street_types_path, STREET_TYPES).unwrap();

    let config: UserConfig = serde_json::from_value(serde_json::json!({
        "data_path": data_path,
        "dest_path": tmp.path().join("output"),
        "street_types_path": street_types_path,
        "output_format": output_format,
        "top_n": 5,
    }))
    .unwrap();

    let output_dir = tmp.path().join("output").join("budapest.osm");
    fs::create_dir_all(&output_dir).unwrap();
    Fixture { _tmp: tmp, config, output_dir }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn audit_writes_report() {
    let fx = fixture("ndjson", OSM);
    AuditEtl::new(&fx.config).process(&fx.output_dir).unwrap();

    let report = read(&fx.output_dir.join("audit_report.txt"));
    assert!(report.contains("UNEXPECTED STREET NAMES:"));
    assert!(report.contains("\"Kucsma\""));
    assert!(report.contains("\"1507\""));
    assert!(report.contains("\"46.9,19.7\""));
    assert!(!report.contains("\"info@vaci.hu\""));
}

#[test]
fn transform_then_query() {
    let fx = fixture("ndjson", OSM);
    TransformEtl::new(&fx.config).process(&fx.output_dir).unwrap();

    let file = fs::File::open(fx.output_dir.join("documents.ndjson")).unwrap();
    let docs = read_documents(file, fx.config.output_format).unwrap();
    assert_eq!(docs.len(), 5);

    let first = serde_json::to_value(&docs[0]).unwrap();
    assert_eq!(first["type"], "node");
    assert_eq!(first["address"]["street"], "Váci utca");
    assert_eq!(first["address"]["postcode"], 1052);
    assert_eq!(first["address"]["housenumber"], "12");
    assert_eq!(first["phone"], "+36 1 234 5678");
    assert_eq!(first["created"]["changeset"], "9");
    assert_eq!(first["position"][0], 47.4979);

    let second = serde_json::to_value(&docs[1]).unwrap();
    assert_eq!(second["address"]["street"], "Kucsma utca");
    assert_eq!(second["address"]["postcode"], 1057);
    assert_eq!(second["phone"], "+36 1 111");

    let way = serde_json::to_value(&docs[3]).unwrap();
    assert!(way.get("address").is_none());
    assert_eq!(way["addr:street:old"], "Régi utca");
    assert_eq!(way["node_refs"], serde_json::json!(["100", "101"]));

    QueryEtl::new(&fx.config).process(&fx.output_dir).unwrap();
    let report = read(&fx.output_dir.join("query_report.txt"));
    assert!(report.contains("COUNT OF DOCUMENTS:\n\n5\n"));
    assert!(report.contains("NUMBER OF CONTRIBUTORS:\n\n3\n"));
    assert!(report.contains("\"hungarian\""));
}

#[test]
fn array_output_round_trips_through_query() {
    let fx = fixture("array", OSM);
    TransformEtl::new(&fx.config).process(&fx.output_dir).unwrap();
    assert!(fx.output_dir.join("documents.json").exists());

    QueryEtl::new(&fx.config).process(&fx.output_dir).unwrap();
    let report = read(&fx.output_dir.join("query_report.txt"));
    assert!(report.contains("COUNT OF DOCUMENTS:\n\n5\n"));
}

#[test]
fn cached_output_is_reused_until_cleaned() {
    let fx = fixture("ndjson", OSM);
    let output = fx.output_dir.join("documents.ndjson");
    fs::write(&output, "stale\n").unwrap();

    let mut etl = TransformEtl::new(&fx.config);
    assert!(etl.is_cached(&fx.output_dir).unwrap());
    etl.process(&fx.output_dir).unwrap();
    assert_eq!(read(&output), "stale\n");

    etl.clean(&fx.output_dir).unwrap();
    etl.process(&fx.output_dir).unwrap();
    assert_eq!(read(&output).lines().count(), 5);
}

#[test]
fn bad_postcode_aborts_transform() {
    let osm = r#"<osm><node id="1" lat="47.5" lon="19.0"><tag k="addr:postcode" v="Budapest"/></node></osm>"#;
    let fx = fixture("ndjson", osm);

    let err = TransformEtl::new(&fx.config).process(&fx.output_dir).unwrap_err();
    assert!(err.message.contains("Budapest"));
    assert!(!fx.output_dir.join("documents.ndjson").exists());
}

#[test]
fn query_without_documents_fails() {
    let fx = fixture("ndjson", OSM);
    let err = QueryEtl::new(&fx.config).process(&fx.output_dir).unwrap_err();
    assert!(err.message.contains("transform"));
}
