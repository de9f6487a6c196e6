// Read side of the message store: filtered history, search, stats, exports
// and deletion. Review transitions live in `review`.

pub mod handlers;
