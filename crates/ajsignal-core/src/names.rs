//! Bus name, member name, and object path validation
//!
//! Each `check_*` function returns the reason a name is rejected so callers
//! can wrap it in the error type of their layer.

/// Longest name the bus accepts, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

fn is_element_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_member_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Check a well-known bus name or an interface name
pub fn check_bus_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err("name is longer than 255 bytes");
    }
    let mut elements = 0;
    for element in name.split('.') {
        let mut chars = element.chars();
        match chars.next() {
            None => return Err("name has an empty element"),
            Some(c) if c.is_ascii_digit() => return Err("element starts with a digit"),
            Some(c) if !is_element_char(c) => return Err("name contains an invalid character"),
            Some(_) => {}
        }
        if !chars.all(is_element_char) {
            return Err("name contains an invalid character");
        }
        elements += 1;
    }
    if elements < 2 {
        return Err("name needs at least two elements");
    }
    Ok(())
}

/// Check a member (method or signal) name
pub fn check_member_name(name: &str) -> Result<(), &'static str> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("member name is empty"),
        Some(c) if c.is_ascii_digit() => return Err("member name starts with a digit"),
        Some(c) if !is_member_char(c) => return Err("member name contains an invalid character"),
        Some(_) => {}
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err("member name is longer than 255 bytes");
    }
    if !chars.all(is_member_char) {
        return Err("member name contains an invalid character");
    }
    Ok(())
}

/// Check an object path
pub fn check_object_path(path: &str) -> Result<(), &'static str> {
    if path == "/" {
        return Ok(());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err("path must start with '/'");
    };
    if rest.ends_with('/') {
        return Err("path has a trailing '/'");
    }
    for element in rest.split('/') {
        if element.is_empty() {
            return Err("path has an empty element");
        }
        if !element.chars().all(is_member_char) {
            return Err("path contains an invalid character");
        }
    }
    Ok(())
}

/// Whether `name` is a valid well-known or interface name
pub fn is_valid_bus_name(name: &str) -> bool {
    check_bus_name(name).is_ok()
}

/// Whether `name` is a valid member name
pub fn is_valid_member_name(name: &str) -> bool {
    check_member_name(name).is_ok()
}

/// Whether `path` is a valid object path
pub fn is_valid_object_path(path: &str) -> bool {
    check_object_path(path).is_ok()
}

/// Whether `name` is a connection's unique name
pub fn is_unique_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_names() {
        assert!(is_valid_bus_name("org.alljoyn.Bus.signal_sample"));
        assert!(is_valid_bus_name("a.b"));
        assert!(is_valid_bus_name("org.my-service.v2"));
        assert!(!is_valid_bus_name("org"));
        assert!(!is_valid_bus_name("org..alljoyn"));
        assert!(!is_valid_bus_name("org.1alljoyn"));
        assert!(!is_valid_bus_name(".org.alljoyn"));
        assert!(!is_valid_bus_name("org.all joyn"));
        assert!(!is_valid_bus_name(""));
    }

    #[test]
    fn test_member_names() {
        assert!(is_valid_member_name("nameChanged"));
        assert!(is_valid_member_name("_private"));
        assert!(!is_valid_member_name("9lives"));
        assert!(!is_valid_member_name("name.changed"));
        assert!(!is_valid_member_name("name-changed"));
    }

    #[test]
    fn test_name_length_limit() {
        let longest = format!("org.{}", "a".repeat(MAX_NAME_LENGTH - 4));
        assert_eq!(longest.len(), 255);
        assert!(is_valid_bus_name(&longest));
        let too_long = format!("{}b", longest);
        assert_eq!(check_bus_name(&too_long), Err("name is longer than 255 bytes"));

        let member = "m".repeat(MAX_NAME_LENGTH);
        assert!(is_valid_member_name(&member));
        assert_eq!(
            check_member_name(&format!("{}m", member)),
            Err("member name is longer than 255 bytes")
        );
    }

    #[test]
    fn test_object_paths() {
        assert!(is_valid_object_path("/"));
        assert!(is_valid_object_path("/org/alljoyn/sample"));
        assert!(!is_valid_object_path(""));
        assert!(!is_valid_object_path("org"));
        assert!(!is_valid_object_path("/org/"));
        assert!(!is_valid_object_path("//org"));
        assert!(!is_valid_object_path("/org/all-joyn"));
    }

    #[test]
    fn test_unique_names() {
        assert!(is_unique_name(":1a2b3c4d.1"));
        assert!(!is_unique_name(":"));
        assert!(!is_unique_name("org.alljoyn.Bus"));
    }
}
