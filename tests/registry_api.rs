//! Integration tests for the `Registry`/`Key` facade, against the SOFTWARE
//! hive fixture.

use reg_parser::{BadRegistryCause, RegistryError, ValueType};
use std::path::PathBuf;

fn test_data_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(filename)
}

#[test]
fn test_root_sub_key_names_are_sorted() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let root = registry.open_key("").expect("open root key");

    let names = root.read_sub_key_names(None).expect("read sub key names");
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted, "read_sub_key_names must return sorted names");
    assert!(names.contains(&"Microsoft".to_string()));
}

#[test]
fn test_get_string_seven_zip_path() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry.open_key("7-Zip").expect("open 7-Zip key");

    let (value, value_type) = key.get_string("Path").expect("get Path");
    assert_eq!(value, r"C:\Program Files\7-Zip\");
    assert_eq!(value_type, ValueType::String);
}

#[test]
fn test_value_lookup_is_case_sensitive() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry.open_key("7-Zip").expect("open 7-Zip key");

    // The on-disk name is exactly "Path"; unlike sub-key descent, value
    // lookup does not fold case.
    let err = key.get_value("PATH", None).unwrap_err();
    assert!(matches!(err, RegistryError::NotExist(_)));
}

#[test]
fn test_get_integer_attribute_mask_dword() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry
        .open_key(r"Classes\*\shell\UpdateEncryptionSettingsWork")
        .expect("open UpdateEncryptionSettingsWork key");

    let (value, value_type) = key.get_integer("AttributeMask").expect("get AttributeMask");
    assert_eq!(value, 8192);
    assert_eq!(value_type, ValueType::Dword);
}

#[test]
fn test_get_integer_and_get_value_agree_for_qword() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry
        .open_key(r"Microsoft\.NETFramework\v2.0.50727\NGenService\State")
        .expect("open NGenService State key");

    let (value, value_type) = key.get_integer("LastSuccess").expect("get LastSuccess");
    assert_eq!(value, 637207470905191361);
    assert_eq!(value_type, ValueType::Qword);

    let (reported_type, len) = key
        .get_value("LastSuccess", None)
        .expect("size LastSuccess");
    assert_eq!(reported_type, ValueType::Qword);
    assert_eq!(len, 8);

    let mut buf = vec![0u8; len];
    let (_, written) = key
        .get_value("LastSuccess", Some(&mut buf))
        .expect("read LastSuccess");
    assert_eq!(written, 8);
    assert_eq!(buf, [0xC1, 0x6B, 0x87, 0x97, 0xD1, 0xD0, 0xD7, 0x08]);
}

#[test]
fn test_get_strings_multi_sz_dll_list() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry
        .open_key(r"Microsoft\Cryptography\OID\EncodingType 0\CryptsvcDllCtrl\DEFAULT")
        .expect("open CryptsvcDllCtrl DEFAULT key");

    let (values, value_type) = key.get_strings("Dll").expect("get Dll");
    assert_eq!(
        values,
        vec![
            r"C:\Windows\System32\crypttpmeksvc.dll".to_string(),
            r"C:\Windows\System32\cryptcatsvc.dll".to_string(),
            r"C:\Windows\System32\webauthn.dll".to_string(),
        ]
    );
    assert_eq!(value_type, ValueType::MultiString);
}

#[test]
fn test_wrong_typed_accessor_reports_actual_type() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry
        .open_key(r"Classes\*\shell\UpdateEncryptionSettingsWork")
        .expect("open UpdateEncryptionSettingsWork key");

    let err = key.get_string("AttributeMask").unwrap_err();
    match err {
        RegistryError::UnexpectedType {
            actual_name,
            actual_code,
            ..
        } => {
            assert_eq!(actual_name, "REG_DWORD");
            assert_eq!(actual_code, 4);
        }
        other => panic!("expected UnexpectedType, got {:?}", other),
    }
}

#[test]
fn test_two_phase_sizing_round_trips_for_every_root_value() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let key = registry.open_key("7-Zip").expect("open 7-Zip key");

    for name in key.read_value_names(None).expect("read value names") {
        let (value_type, required) = key.get_value(&name, None).expect("size value");
        let mut buf = vec![0u8; required];
        let (second_type, written) = key
            .get_value(&name, Some(&mut buf))
            .expect("read value into sized buffer");
        assert_eq!(value_type, second_type);
        assert_eq!(written, required);
    }
}

#[test]
fn test_open_sub_key_missing_child_is_not_exist() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let root = registry.open_key("").expect("open root key");

    let err = root.open_sub_key("ThisKeyDoesNotExist").unwrap_err();
    assert!(matches!(err, RegistryError::NotExist(_)));
}

#[test]
fn test_class_name_label_does_not_error_when_absent() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let hive = reg_parser::Hive::open(&path).expect("open SOFTWARE");
    let root = hive.root_key().expect("open root key");

    // Most keys in a real hive carry no class name; the accessor must
    // report that cleanly rather than erroring.
    let label = root.class_name_label().expect("class_name_label");
    if label.is_none() {
        assert!(root.class_name().expect("class_name").is_none());
    }
}

#[test]
fn test_open_key_rejects_bad_path_gracefully() {
    let path = test_data_path("SOFTWARE");
    if !path.exists() {
        return;
    }
    let registry = reg_parser::Registry::open(&path).expect("open SOFTWARE");
    let err = registry
        .open_key(r"Microsoft\NoSuchNestedKeyHere")
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotExist(_)));
    // Sanity: the underlying cause taxonomy is untouched by a simple
    // not-found path, which is a caller-facing error, not a structural one.
    assert!(!matches!(
        err,
        RegistryError::BadRegistry {
            cause: BadRegistryCause::Malformed(_)
        }
    ));
}
