pub mod common;



#[cfg(test)]
mod test_engine_lifecycle;
