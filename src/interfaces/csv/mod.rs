pub mod loan_writer;
