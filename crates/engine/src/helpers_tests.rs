use super::*;

#[test]
fn reset_ref_overwrites_the_value() {
    let r = Ref::new(1);
    reset_ref(&r, 2);
    assert_eq!(r.get(), 2);
}

#[test]
fn update_ref_mutates_in_place() {
    let r = Ref::new(vec![1, 2]);
    update_ref(&r, |v| v.push(3));
    assert_eq!(r.get(), vec![1, 2, 3]);
}

#[test]
fn clones_share_the_same_underlying_cell() {
    let r = Ref::new(0);
    let r2 = r.clone();
    reset_ref(&r, 5);
    assert_eq!(r2.get(), 5);
}
