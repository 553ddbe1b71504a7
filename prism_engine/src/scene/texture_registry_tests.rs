use super::*;

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_register_deduplicates_paths() {
    let mut registry = TextureRegistry::new();
    let a = registry.register("textures/brick.png");
    let b = registry.register("textures/wood.png");
    let again = registry.register("textures/brick.png");

    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(again, a);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_lookup_by_slot_and_path() {
    let mut registry = TextureRegistry::new();
    registry.register("a.png");
    registry.register("b.png");

    assert_eq!(registry.slot("b.png"), Some(1));
    assert_eq!(registry.slot("c.png"), None);
    assert_eq!(registry.path(0), Some(Path::new("a.png")));
    assert_eq!(registry.path(2), None);

    let all: Vec<_> = registry.iter().map(|(slot, _)| slot).collect();
    assert_eq!(all, vec![0, 1]);
}

#[test]
fn test_empty_registry() {
    let registry = TextureRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.iter().count(), 0);
}

// ============================================================================
// TEXTURE DATA
// ============================================================================

#[test]
fn test_texture_data_checks_pixel_count() {
    assert!(TextureData::new(2, 2, vec![0; 16]).is_ok());
    assert!(matches!(TextureData::new(2, 2, vec![0; 12]), Err(Error::InvalidResource(_))));
    assert!(TextureData::new(0, 2, Vec::new()).is_err());
}

#[test]
fn test_solid_texture() {
    let t = TextureData::solid([1, 2, 3, 4]);
    assert_eq!((t.width(), t.height()), (1, 1));
    assert_eq!(t.pixels(), &[1, 2, 3, 4]);
}
