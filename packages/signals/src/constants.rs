// Rebinding only ever happens between two instances of the same receiver type, so a mismatch
// means our own bookkeeping has been corrupted.
pub(crate) const ERR_REBIND_TYPE_MISMATCH: &str = "attempted to rebind a connection to a \
    receiver of a different type than the one its callable was bound to";
