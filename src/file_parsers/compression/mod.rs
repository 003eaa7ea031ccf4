pub mod lzhuf;
