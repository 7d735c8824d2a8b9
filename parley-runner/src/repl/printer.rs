use parley_core::Anomaly;

pub trait Printer {
    type Object;

    fn print(&mut self, object: Self::Object);
}

pub struct ValuePrinter {}

impl Printer for ValuePrinter {
    type Object = Result<Option<String>, Anomaly>;

    fn print(&mut self, object: Self::Object) {
        match object {
            Ok(Some(value)) => println!("=> {value}"),
            Ok(None) => {}
            // the console interface has shown it already
            Err(_) => {}
        }
    }
}
