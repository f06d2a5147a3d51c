///
/// # C ABI Integration Tests
///
/// Drives the library only through its `ydb_*` entry points, the way a C
/// caller would: config -> driver -> table client -> queries -> result
/// iteration, plus error reporting and config file loading.
///

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::fs;
use std::ptr;
use tempfile::TempDir;

use ydb_c::*;
use ydb_c_core::{
    YDB_ERR_BAD_REQUEST, YDB_ERR_GENERIC, YDB_ERR_NOT_FOUND, YDB_OK, YDB_TYPE_BYTES, YDB_TYPE_DOUBLE,
    YDB_TYPE_INT64, YDB_TYPE_UINT64, YDB_TYPE_UTF8,
};

fn cstr(s: &str) -> CString {
    CString::new(s).expect("no interior NUL")
}

fn last_error() -> String {
    unsafe { CStr::from_ptr(ydb_last_error_message()) }
        .to_string_lossy()
        .into_owned()
}

struct Client {
    drv: *mut YdbDriver,
    tc: *mut YdbTableClient,
}

impl Client {
    fn open(database: &str) -> Self {
        let cfg = ydb_driver_config_create();
        let endpoint = cstr("localhost:2136");
        let database = cstr(database);
        let token = cstr("");
        unsafe {
            assert_eq!(ydb_driver_config_set_endpoint(cfg, endpoint.as_ptr()), YDB_OK);
            assert_eq!(ydb_driver_config_set_database(cfg, database.as_ptr()), YDB_OK);
            assert_eq!(ydb_driver_config_set_auth_token(cfg, token.as_ptr()), YDB_OK);
            assert_eq!(ydb_driver_config_set_max_retries(cfg, 50), YDB_OK);
            let drv = ydb_driver_create(cfg);
            ydb_driver_config_free(cfg);
            assert!(!drv.is_null(), "{}", last_error());
            let tc = ydb_table_client_create(drv);
            assert!(!tc.is_null(), "{}", last_error());
            Client { drv, tc }
        }
    }

    fn scheme(&self, ddl: &str) {
        let ddl = cstr(ddl);
        let status = unsafe { ydb_table_execute_scheme(self.tc, ddl.as_ptr()) };
        assert_eq!(status, YDB_OK, "{}", last_error());
    }

    fn query(&self, query: &str, params: *const YdbQueryParams) -> *mut YdbResultSets {
        let query = cstr(query);
        let mut out: *mut YdbResultSets = ptr::null_mut();
        let status = unsafe { ydb_table_execute_query(self.tc, query.as_ptr(), params, &mut out) };
        assert_eq!(status, YDB_OK, "{}", last_error());
        assert!(!out.is_null());
        out
    }

    fn exec(&self, query: &str) {
        let sets = self.query(query, ptr::null());
        unsafe { ydb_result_sets_free(sets) };
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        unsafe {
            ydb_table_client_free(self.tc);
            ydb_driver_free(self.drv);
        }
    }
}

unsafe fn utf8(rs: *mut YdbResultSet, col: c_int) -> String {
    let mut out: *const c_char = ptr::null();
    let mut len = 0usize;
    assert_eq!(unsafe { ydb_result_set_get_utf8(rs, col, &mut out, &mut len) }, YDB_OK);
    let bytes = unsafe { std::slice::from_raw_parts(out.cast::<u8>(), len) };
    assert_eq!(unsafe { *out.add(len) }, 0, "utf8 values are NUL-terminated");
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn test_create_and_free_driver() {
    let cfg = ydb_driver_config_create();
    let endpoint = cstr("grpcs://ydb.example.com:2135");
    let database = cstr("/ru-central1/b1g/etn");
    unsafe {
        ydb_driver_config_set_endpoint(cfg, endpoint.as_ptr());
        ydb_driver_config_set_database(cfg, database.as_ptr());
        let drv = ydb_driver_create(cfg);
        assert!(!drv.is_null(), "{}", last_error());
        ydb_driver_config_free(cfg);
        ydb_driver_free(drv);
    }
}

#[test]
fn test_select_one_scenario() {
    let client = Client::open("/local");
    unsafe {
        let sets = client.query("SELECT 1 AS one", ptr::null());
        assert_eq!(ydb_result_sets_count(sets), 1);
        let rs = ydb_result_sets_get(sets, 0);
        assert!(!rs.is_null());
        assert_eq!(ydb_result_set_column_count(rs), 1);
        let name = CStr::from_ptr(ydb_result_set_column_name(rs, 0));
        assert_eq!(name.to_str().unwrap(), "one");
        assert_eq!(ydb_result_set_column_type(rs, 0), YDB_TYPE_INT64);

        assert_eq!(ydb_result_set_next_row(rs), 1);
        let mut value = 0i64;
        assert_eq!(ydb_result_set_get_int64(rs, 0, &mut value), YDB_OK);
        assert_eq!(value, 1);
        assert_eq!(ydb_result_set_next_row(rs), 0);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_parameter_round_trip() {
    let client = Client::open("/c_api/params");
    let p = ydb_query_params_create();
    let names: Vec<CString> = ["t", "i32", "u32", "i64", "u64", "f", "d", "b", "raw", "doc"]
        .iter()
        .map(|n| cstr(n))
        .collect();
    let text = cstr("héllo wörld");
    let json = cstr(r#"{"k":[1,2,3]}"#);
    let raw = [0u8, 1, 0, 255, 128];
    unsafe {
        assert_eq!(ydb_query_params_set_utf8(p, names[0].as_ptr(), text.as_ptr()), YDB_OK);
        assert_eq!(ydb_query_params_set_int32(p, names[1].as_ptr(), i32::MIN), YDB_OK);
        assert_eq!(ydb_query_params_set_uint32(p, names[2].as_ptr(), u32::MAX), YDB_OK);
        assert_eq!(ydb_query_params_set_int64(p, names[3].as_ptr(), i64::MIN), YDB_OK);
        assert_eq!(ydb_query_params_set_uint64(p, names[4].as_ptr(), u64::MAX), YDB_OK);
        assert_eq!(ydb_query_params_set_float(p, names[5].as_ptr(), 0.1), YDB_OK);
        assert_eq!(ydb_query_params_set_double(p, names[6].as_ptr(), std::f64::consts::PI), YDB_OK);
        assert_eq!(ydb_query_params_set_bool(p, names[7].as_ptr(), 1), YDB_OK);
        assert_eq!(
            ydb_query_params_set_bytes(p, names[8].as_ptr(), raw.as_ptr().cast::<c_void>(), raw.len()),
            YDB_OK
        );
        assert_eq!(ydb_query_params_set_json(p, names[9].as_ptr(), json.as_ptr()), YDB_OK);

        let sets = client.query(
            "SELECT $t AS t, $i32 AS i32, $u32 AS u32, $i64 AS i64, $u64 AS u64, \
             $f AS f, $d AS d, $b AS b, $raw AS raw, $doc AS doc",
            p,
        );
        ydb_query_params_free(p);

        let rs = ydb_result_sets_get(sets, 0);
        assert_eq!(ydb_result_set_column_type(rs, 0), YDB_TYPE_UTF8);
        assert_eq!(ydb_result_set_column_type(rs, 4), YDB_TYPE_UINT64);
        assert_eq!(ydb_result_set_column_type(rs, 5), YDB_TYPE_DOUBLE);
        assert_eq!(ydb_result_set_column_type(rs, 8), YDB_TYPE_BYTES);
        assert_eq!(ydb_result_set_next_row(rs), 1);

        assert_eq!(utf8(rs, 0), "héllo wörld");

        let mut i = 0i64;
        assert_eq!(ydb_result_set_get_int64(rs, 1, &mut i), YDB_OK);
        assert_eq!(i, i32::MIN as i64);
        let mut u = 0u64;
        assert_eq!(ydb_result_set_get_uint64(rs, 2, &mut u), YDB_OK);
        assert_eq!(u, u32::MAX as u64);
        assert_eq!(ydb_result_set_get_int64(rs, 3, &mut i), YDB_OK);
        assert_eq!(i, i64::MIN);
        assert_eq!(ydb_result_set_get_uint64(rs, 4, &mut u), YDB_OK);
        assert_eq!(u, u64::MAX);

        let mut d = 0f64;
        assert_eq!(ydb_result_set_get_double(rs, 5, &mut d), YDB_OK);
        assert_eq!((d as f32).to_bits(), 0.1f32.to_bits());
        assert_eq!(ydb_result_set_get_double(rs, 6, &mut d), YDB_OK);
        assert_eq!(d.to_bits(), std::f64::consts::PI.to_bits());

        let mut b: c_int = 0;
        assert_eq!(ydb_result_set_get_bool(rs, 7, &mut b), YDB_OK);
        assert_eq!(b, 1);

        let mut out: *const c_void = ptr::null();
        let mut len = 0usize;
        assert_eq!(ydb_result_set_get_bytes(rs, 8, &mut out, &mut len), YDB_OK);
        assert_eq!(std::slice::from_raw_parts(out.cast::<u8>(), len), &raw);

        assert_eq!(utf8(rs, 9), r#"{"k":[1,2,3]}"#);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_declared_column_types() {
    let client = Client::open("/c_api/typed_columns");
    client.scheme(
        "CREATE TABLE events (id Uint64 PRIMARY KEY, ok Bool, at Datetime, payload String, score Double)",
    );
    client.exec("INSERT INTO events VALUES (-1, 1, '2024-03-01 12:00:00', x'00ff', 2.5)");
    unsafe {
        let sets = client.query("SELECT id, ok, at, payload, score FROM events", ptr::null());
        let rs = ydb_result_sets_get(sets, 0);
        let types: Vec<c_int> = (0..5).map(|c| ydb_result_set_column_type(rs, c)).collect();
        assert_eq!(types, [5, 1, 12, 9, 7]);
        assert_eq!(ydb_result_set_next_row(rs), 1);

        let mut u = 0u64;
        assert_eq!(ydb_result_set_get_uint64(rs, 0, &mut u), YDB_OK);
        assert_eq!(u, u64::MAX);
        let mut i = 0i64;
        assert_eq!(ydb_result_set_get_int64(rs, 0, &mut i), YDB_ERR_BAD_REQUEST);

        let mut b: c_int = 0;
        assert_eq!(ydb_result_set_get_bool(rs, 1, &mut b), YDB_OK);
        assert_eq!(b, 1);
        assert_eq!(ydb_result_set_get_uint64(rs, 2, &mut u), YDB_OK);
        assert_eq!(u, 1_709_294_400);

        let mut d = 0f64;
        assert_eq!(ydb_result_set_get_double(rs, 3, &mut d), YDB_ERR_BAD_REQUEST);
        assert_eq!(ydb_result_set_get_double(rs, 4, &mut d), YDB_OK);
        assert_eq!(d, 2.5);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_next_row_counts() {
    let client = Client::open("/c_api/rows");
    client.scheme("CREATE TABLE n (x Int64)");
    unsafe {
        for expected in [0usize, 1, 5] {
            client.exec("DELETE FROM n");
            for x in 0..expected {
                client.exec(&format!("INSERT INTO n VALUES ({})", x));
            }
            let sets = client.query("SELECT x FROM n ORDER BY x", ptr::null());
            let rs = ydb_result_sets_get(sets, 0);
            assert_eq!(ydb_result_set_row_count(rs), expected as c_int);
            let mut seen = 0;
            while ydb_result_set_next_row(rs) == 1 {
                seen += 1;
            }
            assert_eq!(seen, expected);
            for _ in 0..3 {
                assert_eq!(ydb_result_set_next_row(rs), 0);
            }
            ydb_result_sets_free(sets);
        }
    }
}

#[test]
fn test_accessors_need_a_current_row() {
    let client = Client::open("/c_api/cursor");
    unsafe {
        let sets = client.query("SELECT 'x' AS s, 7 AS n", ptr::null());
        let rs = ydb_result_sets_get(sets, 0);
        let mut n = 0i64;
        assert_eq!(ydb_result_set_get_int64(rs, 1, &mut n), YDB_ERR_NOT_FOUND);
        assert_eq!(ydb_result_set_is_null(rs, 1), YDB_ERR_NOT_FOUND);

        assert_eq!(ydb_result_set_next_row(rs), 1);
        assert_eq!(ydb_result_set_get_int64(rs, 1, &mut n), YDB_OK);
        assert_eq!(n, 7);
        assert_eq!(ydb_result_set_get_int64(rs, 2, &mut n), YDB_ERR_BAD_REQUEST);
        assert_eq!(ydb_result_set_get_int64(rs, 0, &mut n), YDB_ERR_BAD_REQUEST);
        assert_eq!(ydb_result_set_get_int64(rs, 1, ptr::null_mut()), YDB_ERR_BAD_REQUEST);

        assert_eq!(ydb_result_set_next_row(rs), 0);
        assert_eq!(ydb_result_set_get_int64(rs, 1, &mut n), YDB_ERR_NOT_FOUND);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_free_result_sets_is_independent() {
    let client = Client::open("/c_api/independent");
    unsafe {
        let first = client.query("SELECT 'first' AS s", ptr::null());
        let second = client.query("SELECT 'second' AS s", ptr::null());
        ydb_result_sets_free(first);

        let rs = ydb_result_sets_get(second, 0);
        assert_eq!(ydb_result_set_next_row(rs), 1);
        assert_eq!(utf8(rs, 0), "second");

        let third = client.query("SELECT 3 AS n", ptr::null());
        assert_eq!(ydb_result_sets_count(third), 1);
        ydb_result_sets_free(third);
        ydb_result_sets_free(second);
    }
}

#[test]
fn test_multiple_result_sets() {
    let client = Client::open("/c_api/multi");
    unsafe {
        let sets = client.query("SELECT 1 AS a; SELECT 'b' AS b, NULL AS c", ptr::null());
        assert_eq!(ydb_result_sets_count(sets), 2);
        assert!(ydb_result_sets_get(sets, 2).is_null());
        let rs = ydb_result_sets_get(sets, 1);
        assert_eq!(ydb_result_set_next_row(rs), 1);
        assert_eq!(ydb_result_set_is_null(rs, 0), 0);
        assert_eq!(ydb_result_set_is_null(rs, 1), 1);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_errors_are_reported_and_output_untouched() {
    let client = Client::open("/c_api/errors");
    let bad = cstr("SELECT * FROM no_such_table");
    let mut out: *mut YdbResultSets = ptr::null_mut();
    unsafe {
        let status = ydb_table_execute_query(client.tc, bad.as_ptr(), ptr::null(), &mut out);
        assert_eq!(status, YDB_ERR_GENERIC);
        assert!(out.is_null());
        assert!(last_error().contains("no_such_table"));
        assert_eq!(ydb_last_error_status(), YDB_ERR_GENERIC);

        // Successful calls leave the diagnostic in place.
        let sets = client.query("SELECT 1", ptr::null());
        assert!(last_error().contains("no_such_table"));
        ydb_result_sets_free(sets);

        assert_eq!(
            ydb_table_execute_query(ptr::null_mut(), bad.as_ptr(), ptr::null(), &mut out),
            YDB_ERR_BAD_REQUEST
        );
        assert_eq!(
            ydb_table_execute_query(client.tc, ptr::null(), ptr::null(), &mut out),
            YDB_ERR_BAD_REQUEST
        );
        assert_eq!(
            ydb_table_execute_query(client.tc, bad.as_ptr(), ptr::null(), ptr::null_mut()),
            YDB_ERR_BAD_REQUEST
        );
        assert!(out.is_null());

        let typo = cstr("SELEC 1");
        assert_eq!(ydb_table_execute_query(client.tc, typo.as_ptr(), ptr::null(), &mut out), YDB_ERR_GENERIC);
        assert!(out.is_null());
        assert!(last_error().contains("syntax error"), "{}", last_error());
    }
}

#[test]
fn test_error_state_is_per_thread() {
    let cfg = ydb_driver_config_create();
    unsafe {
        assert_eq!(ydb_driver_config_set_endpoint(cfg, ptr::null()), YDB_ERR_BAD_REQUEST);
        ydb_driver_config_free(cfg);
    }
    assert!(last_error().contains("endpoint is null"));

    let other = std::thread::spawn(|| (last_error(), ydb_last_error_status())).join().unwrap();
    assert_eq!(other, (String::new(), YDB_OK));
}

#[test]
fn test_clients_share_a_driver_across_threads() {
    let client = Client::open("/c_api/threads");
    client.scheme("CREATE TABLE hits (worker Int64, n Int64)");
    let drv = client.drv as usize;

    let workers: Vec<_> = (0..4)
        .map(|w| {
            std::thread::spawn(move || unsafe {
                let tc = ydb_table_client_create(drv as *mut YdbDriver);
                assert!(!tc.is_null());
                for n in 0..10 {
                    let q = cstr(&format!("INSERT INTO hits VALUES ({}, {})", w, n));
                    let mut out: *mut YdbResultSets = ptr::null_mut();
                    assert_eq!(ydb_table_execute_query(tc, q.as_ptr(), ptr::null(), &mut out), YDB_OK);
                    ydb_result_sets_free(out);
                }
                ydb_table_client_free(tc);
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    unsafe {
        let sets = client.query("SELECT count(*) AS c FROM hits", ptr::null());
        let rs = ydb_result_sets_get(sets, 0);
        assert_eq!(ydb_result_set_next_row(rs), 1);
        let mut c = 0i64;
        assert_eq!(ydb_result_set_get_int64(rs, 0, &mut c), YDB_OK);
        assert_eq!(c, 40);
        ydb_result_sets_free(sets);
    }
}

#[test]
fn test_config_file_overlay() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("ydb.toml");
    fs::write(
        &path,
        r#"
endpoint = "grpc://localhost:2136"
database = "/c_api/from_file"
max_retries = 2
operation_timeout_ms = 5000
"#,
    )
    .unwrap();
    let bad_path = dir.path().join("bad.toml");
    fs::write(&bad_path, "endpoint = \"localhost:1\"\nretries = 3\n").unwrap();

    let cfg = ydb_driver_config_create();
    let path = cstr(path.to_str().unwrap());
    let bad_path = cstr(bad_path.to_str().unwrap());
    let missing = cstr(dir.path().join("missing.toml").to_str().unwrap());
    unsafe {
        assert_eq!(ydb_driver_config_load_file(cfg, path.as_ptr()), YDB_OK, "{}", last_error());
        assert_eq!(ydb_driver_config_load_file(cfg, bad_path.as_ptr()), YDB_ERR_BAD_REQUEST);
        assert!(last_error().contains("retries"));
        assert_ne!(ydb_driver_config_load_file(cfg, missing.as_ptr()), YDB_OK);

        let drv = ydb_driver_create(cfg);
        ydb_driver_config_free(cfg);
        assert!(!drv.is_null(), "{}", last_error());
        assert_eq!(ydb_driver_wait_ready(drv, 5000), YDB_OK);
        ydb_driver_free(drv);
    }
}
