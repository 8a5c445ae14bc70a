pub mod lemire_minmax;
